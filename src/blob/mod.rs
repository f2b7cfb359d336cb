//! Blob storage collaborator for entry media.

mod local;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

pub type BlobResult<T> = Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    #[error("blob store unavailable")]
    Unavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub path: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BlobResult<BlobRef>;

    fn public_url(&self, blob: &BlobRef) -> String;

    /// Accepts either a public URL handed out by this store or a raw path.
    async fn delete(&self, url_or_path: &str) -> BlobResult<()>;
}

/// Object paths are relative, slash separated, and never climb upwards.
pub(crate) fn checked_path(path: &str) -> BlobResult<&str> {
    let path = path.trim_start_matches('/');
    let valid = !path.is_empty()
        && path
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != ".." && !part.contains('\\'));

    if valid {
        Ok(path)
    } else {
        Err(BlobError::InvalidPath(path.to_owned()))
    }
}

/// Keeps ASCII letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() { "upload".to_owned() } else { cleaned.to_owned() }
}
