use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{RwLock, broadcast};

use super::{Change, ChangeFeed, Direction, Doc, DocumentStore, StoreError, StoreResult, compare_fields};

/// Process-local document store. Used for `DATABASE_URL=memory` demos and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<(String, String), Value>>,
    feed: ChangeFeed,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

fn key(collection: &str, id: &str) -> (String, String) {
    (collection.to_owned(), id.to_owned())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.online()?;
        Ok(self.docs.read().await.get(&key(collection, id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> StoreResult<()> {
        self.online()?;
        self.docs.write().await.insert(key(collection, id), doc);
        self.feed.publish(collection, id);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> StoreResult<()> {
        self.online()?;
        {
            let mut docs = self.docs.write().await;
            let doc = docs
                .get_mut(&key(collection, id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;

            if let (Value::Object(doc), Value::Object(partial)) = (doc, partial) {
                doc.extend(partial);
            }
        }
        self.feed.publish(collection, id);
        Ok(())
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> StoreResult<()> {
        self.online()?;
        {
            let mut docs = self.docs.write().await;
            let doc = docs
                .get_mut(&key(collection, id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;

            if !doc.is_object() {
                *doc = Value::Object(Map::new());
            }
            let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
            doc[field] = Value::from(current + delta);
        }
        self.feed.publish(collection, id);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.online()?;
        if self.docs.write().await.remove(&key(collection, id)).is_some() {
            self.feed.publish(collection, id);
        }
        Ok(())
    }

    async fn list(&self, collection: &str, order_by: &str, direction: Direction) -> StoreResult<Vec<Doc>> {
        self.online()?;
        let mut docs: Vec<Doc> = self
            .docs
            .read()
            .await
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), body)| Doc {
                id: id.clone(),
                body: body.clone(),
            })
            .collect();

        docs.sort_by(|a, b| {
            let primary = compare_fields(a.body.get(order_by), b.body.get(order_by));
            let primary = match direction {
                Direction::Asc => primary,
                Direction::Desc => primary.reverse(),
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });

        Ok(docs)
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }
}
