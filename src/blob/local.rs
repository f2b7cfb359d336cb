use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{BlobError, BlobRef, BlobResult, BlobStore, checked_path};

const CONTENT_TYPE_SUFFIX: &str = ".content-type";

/// Stores media below a directory and hands out URLs under `url_prefix`,
/// which the `/media` route serves.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_owned(),
        }
    }

    fn full_path(&self, path: &str) -> BlobResult<PathBuf> {
        Ok(self.root.join(checked_path(path)?))
    }

    fn path_from_url<'a>(&self, url_or_path: &'a str) -> &'a str {
        url_or_path
            .strip_prefix(self.url_prefix.as_str())
            .unwrap_or(url_or_path)
    }

    /// Bytes and content type of a stored object.
    pub async fn read(&self, path: &str) -> BlobResult<(Vec<u8>, String)> {
        let full_path = self.full_path(path)?;
        let bytes = fs::read(&full_path).await.map_err(|e| not_found_or_io(e, path))?;
        let content_type = fs::read_to_string(sidecar(&full_path))
            .await
            .unwrap_or_else(|_| "application/octet-stream".to_owned());

        Ok((bytes, content_type))
    }
}

fn sidecar(path: &std::path::Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(CONTENT_TYPE_SUFFIX);
    PathBuf::from(name)
}

fn not_found_or_io(e: std::io::Error, path: &str) -> BlobError {
    if e.kind() == ErrorKind::NotFound {
        BlobError::NotFound(path.to_owned())
    } else {
        BlobError::Io(e)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BlobResult<BlobRef> {
        let path = checked_path(path)?;
        if path.ends_with(CONTENT_TYPE_SUFFIX) {
            return Err(BlobError::InvalidPath(path.to_owned()));
        }

        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, bytes).await?;
        fs::write(sidecar(&full_path), content_type).await?;

        Ok(BlobRef { path: path.to_owned() })
    }

    fn public_url(&self, blob: &BlobRef) -> String {
        format!("{}/{}", self.url_prefix, blob.path)
    }

    async fn delete(&self, url_or_path: &str) -> BlobResult<()> {
        let path = self.path_from_url(url_or_path);
        let full_path = self.full_path(path)?;

        fs::remove_file(&full_path).await.map_err(|e| not_found_or_io(e, path))?;
        let _ = fs::remove_file(sidecar(&full_path)).await;
        Ok(())
    }
}
