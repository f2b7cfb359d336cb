//! Submitting, editing and deleting the signed-in user's entry.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    blob::{BlobError, BlobStore, sanitize_file_name},
    clock::Clock,
    media::{self, ImageCodec, MediaError, MediaFile, MediaLimits},
    model::{Entry, User},
    repo::EntryRepository,
    schedule::{Phase, Window, human_time},
    store::StoreError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("Uploads open on {}.", human_time(*.0))]
    NotOpen(OffsetDateTime),

    #[error("Uploads closed on {}.", human_time(*.0))]
    Closed(OffsetDateTime),

    #[error("Please fill in the {0}.")]
    MissingField(&'static str),

    #[error("Please provide a photo or video of your costume.")]
    MediaRequired,

    #[error("That file is {size} bytes; the limit is {max} bytes.")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Only images and videos can be uploaded.")]
    UnsupportedMedia(String),

    #[error("Deletion was not confirmed.")]
    NotConfirmed,

    #[error("You have no costume to delete.")]
    NoEntry,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload rejected: {0}")]
    Rejected(#[from] UploadRejection),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Media(MediaError),
}

impl From<MediaError> for UploadError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Unsupported(t) => UploadError::Rejected(UploadRejection::UnsupportedMedia(t)),
            other => UploadError::Media(other),
        }
    }
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Rejected(reason) => reason.to_string(),
            _ => "Failed to upload costume.".to_owned(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, UploadError::Rejected(_))
    }
}

/// Free-text fields of the upload form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryForm {
    pub uploader_name: String,
    pub costume_name: String,
    pub position: String,
    pub description: String,
}

impl EntryForm {
    /// Trims every field and checks the required ones.
    pub fn validated(self) -> Result<Self, UploadRejection> {
        let form = Self {
            uploader_name: self.uploader_name.trim().to_owned(),
            costume_name: self.costume_name.trim().to_owned(),
            position: self.position.trim().to_owned(),
            description: self.description.trim().to_owned(),
        };

        for (value, name) in [
            (&form.costume_name, "costume name"),
            (&form.position, "position"),
            (&form.uploader_name, "uploader name"),
        ] {
            if value.is_empty() {
                return Err(UploadRejection::MissingField(name));
            }
        }
        Ok(form)
    }
}

#[derive(Clone)]
pub struct UploadWorkflow {
    repo: EntryRepository,
    blobs: Arc<dyn BlobStore>,
    codec: Arc<dyn ImageCodec>,
    clock: Arc<dyn Clock>,
    window: Window,
    limits: MediaLimits,
}

impl UploadWorkflow {
    pub fn new(
        repo: EntryRepository,
        blobs: Arc<dyn BlobStore>,
        codec: Arc<dyn ImageCodec>,
        clock: Arc<dyn Clock>,
        window: Window,
        limits: MediaLimits,
    ) -> Self {
        Self { repo, blobs, codec, clock, window, limits }
    }

    pub fn limits(&self) -> MediaLimits {
        self.limits
    }

    /// Every mutating action goes through this gate first.
    pub fn check_window(&self) -> Result<(), UploadRejection> {
        match self.window.phase(self.clock.now()) {
            Phase::Upcoming => Err(UploadRejection::NotOpen(self.window.opens)),
            Phase::Closed => Err(UploadRejection::Closed(self.window.closes)),
            Phase::Open => Ok(()),
        }
    }

    /// Gate for picking a file, before any bytes are sent.
    pub fn check_selection(&self, size: u64) -> Result<(), UploadRejection> {
        self.check_window()?;
        self.check_size(size)
    }

    fn check_size(&self, size: u64) -> Result<(), UploadRejection> {
        if size > self.limits.max_upload_bytes {
            return Err(UploadRejection::FileTooLarge {
                size,
                max: self.limits.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Creates or edits `user`'s entry. Media is optional when editing.
    pub async fn submit_entry(&self, user: &User, form: EntryForm, file: Option<MediaFile>) -> Result<Entry, UploadError> {
        self.check_window()?;
        let form = form.validated()?;
        if let Some(file) = &file {
            self.check_size(file.bytes.len() as u64)?;
        }

        let existing = self.repo.get_entry(&user.uid).await?;
        if file.is_none() && existing.is_none() {
            return Err(UploadRejection::MediaRequired.into());
        }

        let now = self.clock.now();
        let (media_url, media_kind) = match file {
            Some(file) => {
                let path = format!(
                    "costumes/{}/{}-{}",
                    user.uid,
                    Uuid::now_v7().simple(),
                    sanitize_file_name(&file.file_name)
                );
                let prepared = media::prepare(file, self.limits, self.codec.clone()).await?;
                let blob = self
                    .blobs
                    .upload(&path, prepared.encoded.bytes, &prepared.encoded.content_type)
                    .await?;
                (self.blobs.public_url(&blob), prepared.kind)
            }
            None => match &existing {
                Some(e) => (e.media_url.clone(), e.media_kind),
                None => return Err(UploadRejection::MediaRequired.into()),
            },
        };

        let entry = Entry {
            id: user.uid.clone(),
            owner_id: user.uid.clone(),
            owner_display_name: user.display_name.clone(),
            owner_photo_url: user.photo_url.clone(),
            uploader_name: form.uploader_name,
            costume_name: form.costume_name,
            position: form.position,
            description: form.description,
            media_url,
            media_kind,
            uploaded_at: existing.as_ref().map_or(now, |e| e.uploaded_at),
            updated_at: now,
            vote_count: existing.as_ref().map_or(0, |e| e.vote_count),
        };

        let written = match &existing {
            Some(_) => self.repo.update_entry_details(&entry).await,
            None => self.repo.put_entry(&entry).await,
        };
        if let Err(e) = written {
            let replaced = existing.as_ref().is_none_or(|old| old.media_url != entry.media_url);
            if replaced {
                if let Err(cleanup) = self.blobs.delete(&entry.media_url).await {
                    warn!("could not delete orphaned media {}: {cleanup}", entry.media_url);
                }
            }
            return Err(e.into());
        }
        info!(owner = %entry.owner_id, costume = %entry.costume_name, "entry saved");

        if let Some(old) = existing.filter(|old| old.media_url != entry.media_url) {
            if let Err(e) = self.blobs.delete(&old.media_url).await {
                warn!("could not delete replaced media {}: {e}", old.media_url);
            }
        }

        Ok(entry)
    }

    /// Removes `user`'s media and entry. A media asset that is already gone
    /// does not stop the entry from being deleted.
    pub async fn delete_entry(&self, user: &User, confirmed: bool) -> Result<(), UploadError> {
        self.check_window()?;
        if !confirmed {
            return Err(UploadRejection::NotConfirmed.into());
        }

        let Some(entry) = self.repo.get_entry(&user.uid).await? else {
            return Err(UploadRejection::NoEntry.into());
        };

        match self.blobs.delete(&entry.media_url).await {
            Ok(()) | Err(BlobError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.repo.delete_entry(&user.uid).await?;

        info!(owner = %user.uid, "entry deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;
    use time::macros::datetime;
    use tokio::sync::broadcast;

    use super::*;
    use crate::{
        blob::MemoryBlobStore,
        media::PassthroughCodec,
        store::{Change, Direction, Doc, DocumentStore, MemoryStore, StoreResult},
    };

    /// Reads work, writes fail.
    struct ReadOnly(MemoryStore);

    #[async_trait]
    impl DocumentStore for ReadOnly {
        async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
            self.0.get(collection, id).await
        }
        async fn set(&self, _: &str, _: &str, _: Value) -> StoreResult<()> {
            Err(StoreError::Unavailable)
        }
        async fn update(&self, _: &str, _: &str, _: Value) -> StoreResult<()> {
            Err(StoreError::Unavailable)
        }
        async fn increment(&self, _: &str, _: &str, _: &str, _: i64) -> StoreResult<()> {
            Err(StoreError::Unavailable)
        }
        async fn delete(&self, _: &str, _: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable)
        }
        async fn list(&self, collection: &str, order_by: &str, direction: Direction) -> StoreResult<Vec<Doc>> {
            self.0.list(collection, order_by, direction).await
        }
        fn changes(&self) -> broadcast::Receiver<Change> {
            self.0.changes()
        }
    }

    #[tokio::test]
    async fn failed_entry_write_removes_the_new_media() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let window = Window::new(datetime!(2025-10-20 00:00 UTC), datetime!(2025-10-31 00:00 UTC)).unwrap();
        let uploads = UploadWorkflow::new(
            EntryRepository::new(Arc::new(ReadOnly(MemoryStore::new()))),
            blobs.clone(),
            Arc::new(PassthroughCodec),
            Arc::new(crate::clock::FixedClock::new(datetime!(2025-10-25 12:00 UTC))),
            window,
            MediaLimits::default(),
        );
        let user = User { uid: "u1".into(), display_name: "Ada".into(), photo_url: None };
        let form = EntryForm {
            uploader_name: "Ada".into(),
            costume_name: "Witch".into(),
            position: "Front Row".into(),
            description: String::new(),
        };
        let file = MediaFile {
            file_name: "w.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: vec![0xff, 0xd8, 0xff],
        };

        let err = uploads.submit_entry(&user, form, Some(file)).await.unwrap_err();
        assert!(matches!(err, UploadError::Store(StoreError::Unavailable)));
        assert_eq!(blobs.len().await, 0);
    }

    #[test]
    fn form_fields_are_trimmed_and_required() {
        let form = EntryForm {
            uploader_name: "  Ada ".into(),
            costume_name: " Witch".into(),
            position: "Front Row ".into(),
            description: "  ".into(),
        };
        let form = form.validated().unwrap();
        assert_eq!(form.uploader_name, "Ada");
        assert_eq!(form.costume_name, "Witch");
        assert_eq!(form.description, "");

        let missing = EntryForm {
            costume_name: "Witch".into(),
            position: "   ".into(),
            uploader_name: "Ada".into(),
            ..EntryForm::default()
        };
        assert_eq!(missing.validated(), Err(UploadRejection::MissingField("position")));
    }

    #[test]
    fn window_messages_say_when() {
        let opens = datetime!(2025-10-25 09:00 +07:00);
        assert_eq!(
            UploadRejection::NotOpen(opens).to_string(),
            "Uploads open on Oct 25, 2025 09:00 UTC+07:00."
        );
        assert_eq!(
            UploadRejection::Closed(opens).to_string(),
            "Uploads closed on Oct 25, 2025 09:00 UTC+07:00."
        );
    }

    #[test]
    fn collaborator_failures_get_a_generic_message() {
        let err = UploadError::Store(StoreError::Unavailable);
        assert!(!err.is_rejection());
        assert_eq!(err.user_message(), "Failed to upload costume.");
    }
}
