use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// How an entry's media is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// `None` for anything that is neither an image nor a video.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let top = content_type.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// A user's costume submission. `id` is always the owner's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub owner_id: String,
    pub owner_display_name: String,
    pub owner_photo_url: Option<String>,

    pub uploader_name: String,
    pub costume_name: String,
    pub position: String,
    #[serde(default)]
    pub description: String,

    pub media_url: String,
    pub media_kind: MediaKind,

    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    #[serde(default)]
    pub vote_count: i64,
}

/// A voter's current pick. Stored under the voter's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub voter_id: String,
    pub target_owner_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub cast_at: OffsetDateTime,
}

/// Identity snapshot handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn media_kind_from_content_type() {
        assert_eq!(MediaKind::from_content_type("image/jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_content_type("Video/MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_content_type("application/pdf"), None);
        assert_eq!(MediaKind::from_content_type(""), None);
    }

    #[test]
    fn entry_document_shape() {
        let entry = Entry {
            id: "u1".into(),
            owner_id: "u1".into(),
            owner_display_name: "Ada".into(),
            owner_photo_url: None,
            uploader_name: "Ada".into(),
            costume_name: "Witch".into(),
            position: "Front Row".into(),
            description: String::new(),
            media_url: "/media/costumes/u1/a.jpg".into(),
            media_kind: MediaKind::Image,
            uploaded_at: datetime!(2025-10-31 10:00 UTC),
            updated_at: datetime!(2025-10-31 10:00 UTC),
            vote_count: 0,
        };

        let doc = serde_json::to_value(&entry).unwrap();
        assert_eq!(doc["costumeName"], json!("Witch"));
        assert_eq!(doc["mediaKind"], json!("image"));
        assert_eq!(doc["uploadedAt"], json!("2025-10-31T10:00:00Z"));
        assert_eq!(doc["voteCount"], json!(0));

        let back: Entry = serde_json::from_value(doc).unwrap();
        assert_eq!(back, entry);
    }
}
