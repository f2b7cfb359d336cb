//! Media preparation before upload: size limits and image downscaling.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::model::MediaKind;

/// Quality used when the first encode does not fit the budget.
pub const FALLBACK_QUALITY: u8 = 70;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported media type {0}")]
    Unsupported(String),

    #[error("image compression failed: {0}")]
    Codec(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaLimits {
    pub max_upload_bytes: u64,
    pub max_image_dimension: u32,
    pub image_budget_bytes: u64,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            max_image_dimension: 1280,
            image_budget_bytes: 1024 * 1024,
        }
    }
}

/// A file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Downscale/recompress utility.
pub trait ImageCodec: Send + Sync {
    /// Re-encode so that neither side exceeds `max_dimension`. `None` quality
    /// means the codec's default.
    fn reencode(&self, bytes: &[u8], content_type: &str, max_dimension: u32, quality: Option<u8>)
    -> anyhow::Result<Encoded>;
}

/// Hands images back untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCodec;

impl ImageCodec for PassthroughCodec {
    fn reencode(&self, bytes: &[u8], content_type: &str, _: u32, _: Option<u8>) -> anyhow::Result<Encoded> {
        Ok(Encoded {
            bytes: bytes.to_vec(),
            content_type: content_type.to_owned(),
        })
    }
}

/// Scales `(width, height)` so the longer side is at most `max`, keeping the
/// aspect ratio. Sizes already within bounds are returned as is.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max || longest == 0 {
        return (width, height);
    }

    let scale = |side: u32| ((u64::from(side) * u64::from(max) + u64::from(longest) / 2) / u64::from(longest)).max(1) as u32;
    (scale(width), scale(height))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMedia {
    pub kind: MediaKind,
    pub encoded: Encoded,
}

/// Images go through the codec, retrying at [`FALLBACK_QUALITY`] when the
/// first pass is over budget; videos pass through unmodified.
pub async fn prepare(file: MediaFile, limits: MediaLimits, codec: Arc<dyn ImageCodec>) -> Result<PreparedMedia, MediaError> {
    let kind = MediaKind::from_content_type(&file.content_type)
        .ok_or_else(|| MediaError::Unsupported(file.content_type.clone()))?;

    if kind == MediaKind::Video {
        return Ok(PreparedMedia {
            kind,
            encoded: Encoded {
                bytes: file.bytes,
                content_type: file.content_type,
            },
        });
    }

    let encoded = tokio::task::spawn_blocking(move || -> anyhow::Result<Encoded> {
        let max = limits.max_image_dimension;
        let first = codec.reencode(&file.bytes, &file.content_type, max, None)?;
        if (first.bytes.len() as u64) < limits.image_budget_bytes {
            return Ok(first);
        }

        debug!("{} is {} bytes after first pass, lowering quality", file.file_name, first.bytes.len());
        codec.reencode(&file.bytes, &file.content_type, max, Some(FALLBACK_QUALITY))
    })
    .await
    .map_err(|e| MediaError::Codec(e.into()))?
    .map_err(MediaError::Codec)?;

    Ok(PreparedMedia { kind, encoded })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn fit_within_keeps_aspect_ratio() {
        assert_eq!(fit_within(4000, 3000, 1280), (1280, 960));
        assert_eq!(fit_within(1080, 1920, 1280), (720, 1280));
        assert_eq!(fit_within(800, 600, 1280), (800, 600));
        assert_eq!(fit_within(1280, 1280, 1280), (1280, 1280));
        assert_eq!(fit_within(10000, 1, 1280), (1280, 1));
    }

    /// Shrinks the payload to `len / divisor`, remembering which qualities were asked for.
    struct ShrinkingCodec {
        divisor: usize,
        calls: Mutex<Vec<Option<u8>>>,
    }

    impl ImageCodec for ShrinkingCodec {
        fn reencode(&self, bytes: &[u8], _: &str, _: u32, quality: Option<u8>) -> anyhow::Result<Encoded> {
            self.calls.lock().unwrap().push(quality);
            let divisor = if quality.is_some() { self.divisor * 4 } else { self.divisor };
            Ok(Encoded {
                bytes: vec![0; bytes.len() / divisor],
                content_type: "image/jpeg".into(),
            })
        }
    }

    fn image(len: usize) -> MediaFile {
        MediaFile {
            file_name: "ghost.png".into(),
            content_type: "image/png".into(),
            bytes: vec![1; len],
        }
    }

    fn limits() -> MediaLimits {
        MediaLimits {
            image_budget_bytes: 100,
            ..MediaLimits::default()
        }
    }

    #[tokio::test]
    async fn small_images_take_one_pass() {
        let codec = Arc::new(ShrinkingCodec { divisor: 2, calls: Mutex::new(vec![]) });
        let prepared = prepare(image(100), limits(), codec.clone()).await.unwrap();

        assert_eq!(prepared.kind, MediaKind::Image);
        assert_eq!(prepared.encoded.bytes.len(), 50);
        assert_eq!(prepared.encoded.content_type, "image/jpeg");
        assert_eq!(*codec.calls.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn oversized_images_fall_back_to_lower_quality() {
        let codec = Arc::new(ShrinkingCodec { divisor: 2, calls: Mutex::new(vec![]) });
        let prepared = prepare(image(400), limits(), codec.clone()).await.unwrap();

        assert_eq!(prepared.encoded.bytes.len(), 50);
        assert_eq!(*codec.calls.lock().unwrap(), vec![None, Some(FALLBACK_QUALITY)]);
    }

    #[tokio::test]
    async fn videos_skip_the_codec() {
        let codec = Arc::new(ShrinkingCodec { divisor: 2, calls: Mutex::new(vec![]) });
        let video = MediaFile {
            file_name: "spooky.mp4".into(),
            content_type: "video/mp4".into(),
            bytes: vec![7; 1000],
        };
        let prepared = prepare(video.clone(), limits(), codec.clone()).await.unwrap();

        assert_eq!(prepared.kind, MediaKind::Video);
        assert_eq!(prepared.encoded.bytes, video.bytes);
        assert!(codec.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_types_are_refused() {
        let pdf = MediaFile {
            file_name: "costume.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: vec![0; 10],
        };
        assert!(matches!(
            prepare(pdf, limits(), Arc::new(PassthroughCodec)).await,
            Err(MediaError::Unsupported(_))
        ));
    }
}
