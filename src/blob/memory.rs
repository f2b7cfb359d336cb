use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BlobError, BlobRef, BlobResult, BlobStore, checked_path};

const URL_PREFIX: &str = "memory://";

/// In-process blob store for tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
    offline: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn contains(&self, url_or_path: &str) -> bool {
        let path = url_or_path.strip_prefix(URL_PREFIX).unwrap_or(url_or_path);
        self.objects.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn content_type(&self, url_or_path: &str) -> Option<String> {
        let path = url_or_path.strip_prefix(URL_PREFIX).unwrap_or(url_or_path);
        self.objects.read().await.get(path).map(|(_, t)| t.clone())
    }

    fn online(&self) -> BlobResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BlobResult<BlobRef> {
        self.online()?;
        let path = checked_path(path)?.to_owned();
        self.objects
            .write()
            .await
            .insert(path.clone(), (bytes, content_type.to_owned()));
        Ok(BlobRef { path })
    }

    fn public_url(&self, blob: &BlobRef) -> String {
        format!("{URL_PREFIX}{}", blob.path)
    }

    async fn delete(&self, url_or_path: &str) -> BlobResult<()> {
        self.online()?;
        let path = url_or_path.strip_prefix(URL_PREFIX).unwrap_or(url_or_path);
        match self.objects.write().await.remove(path) {
            Some(_) => Ok(()),
            None => Err(BlobError::NotFound(path.to_owned())),
        }
    }
}
