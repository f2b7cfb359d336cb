//! Document store collaborator.
//!
//! Documents are JSON objects addressed by `(collection, id)`. Adapters only
//! need the primitive reads and writes plus a change feed; realtime
//! subscriptions are built on top of those in [`Subscription`].

mod feed;
mod memory;
mod sqlite;

use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

pub use feed::{Change, ChangeFeed};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("document store unavailable")]
    Unavailable,

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("malformed document: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_owned(),
            id: id.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Doc {
    pub id: String,
    pub body: Value,
}

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Collection {
        collection: String,
        order_by: String,
        direction: Direction,
    },
    Document {
        collection: String,
        id: String,
    },
}

impl Query {
    pub fn ordered(collection: &str, order_by: &str, direction: Direction) -> Self {
        Query::Collection {
            collection: collection.to_owned(),
            order_by: order_by.to_owned(),
            direction,
        }
    }

    pub fn document(collection: &str, id: &str) -> Self {
        Query::Document {
            collection: collection.to_owned(),
            id: id.to_owned(),
        }
    }

    fn matches(&self, change: &Change) -> bool {
        match self {
            Query::Collection { collection, .. } => *collection == change.collection,
            Query::Document { collection, id } => *collection == change.collection && *id == change.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Docs(Vec<Doc>),
    Doc(Option<Doc>),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Upsert the whole document.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> StoreResult<()>;

    /// Merge top-level fields into an existing document.
    async fn update(&self, collection: &str, id: &str, partial: Value) -> StoreResult<()>;

    /// Add `delta` to a numeric field in one step. Missing fields count as zero.
    async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> StoreResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Every document of a collection ordered by `order_by`, ties broken by id.
    async fn list(&self, collection: &str, order_by: &str, direction: Direction) -> StoreResult<Vec<Doc>>;

    fn changes(&self) -> broadcast::Receiver<Change>;
}

/// Long-lived handle that yields a fresh snapshot after every relevant change.
///
/// The first call to [`Subscription::next`] returns the current state. Dropping
/// the handle (or calling [`Subscription::close`]) stops delivery.
pub struct Subscription {
    store: Arc<dyn DocumentStore>,
    query: Query,
    changes: broadcast::Receiver<Change>,
    /// Set until a read has been handed out since the last matching change.
    stale: bool,
}

impl Subscription {
    pub fn new(store: Arc<dyn DocumentStore>, query: Query) -> Self {
        let changes = store.changes();
        Self {
            store,
            query,
            changes,
            stale: true,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// `None` once the store has shut down its change feed.
    ///
    /// Cancel safe: a call dropped mid-read leaves the subscription stale, so
    /// the next call reads again instead of waiting for another change.
    pub async fn next(&mut self) -> Option<StoreResult<Snapshot>> {
        while !self.stale {
            match self.changes.recv().await {
                Ok(change) if self.query.matches(&change) => self.stale = true,
                Ok(_) => continue,
                // missed something; a fresh read covers it
                Err(RecvError::Lagged(_)) => self.stale = true,
                Err(RecvError::Closed) => return None,
            }
        }

        let snapshot = self.read().await;
        self.stale = false;
        Some(snapshot)
    }

    pub fn close(self) {}

    async fn read(&self) -> StoreResult<Snapshot> {
        match &self.query {
            Query::Collection { collection, order_by, direction } => {
                Ok(Snapshot::Docs(self.store.list(collection, order_by, *direction).await?))
            }
            Query::Document { collection, id } => {
                let body = self.store.get(collection, id).await?;
                Ok(Snapshot::Doc(body.map(|body| Doc { id: id.clone(), body })))
            }
        }
    }
}

/// Ordering used for `list`. Numbers compare numerically, strings
/// lexicographically, and missing or null values sort first.
pub(crate) fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn compare_fields_orders_numbers_and_strings() {
        assert_eq!(compare_fields(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_fields(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare_fields(None, Some(&json!(0))), Ordering::Less);
        assert_eq!(compare_fields(Some(&Value::Null), None), Ordering::Equal);
    }

    #[tokio::test]
    async fn subscription_yields_snapshot_then_updates() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        store.set("votes", "b", json!({"targetOwnerId": "a"})).await.unwrap();

        let mut sub = Subscription::new(store.clone(), Query::document("votes", "b"));
        let first = sub.next().await.unwrap().unwrap();
        assert!(matches!(first, Snapshot::Doc(Some(ref d)) if d.body["targetOwnerId"] == "a"));

        // unrelated writes do not wake the subscriber
        store.set("votes", "z", json!({"targetOwnerId": "q"})).await.unwrap();
        store.set("votes", "b", json!({"targetOwnerId": "c"})).await.unwrap();

        let second = sub.next().await.unwrap().unwrap();
        assert!(matches!(second, Snapshot::Doc(Some(ref d)) if d.body["targetOwnerId"] == "c"));

        store.delete("votes", "b").await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), Snapshot::Doc(None));
        sub.close();
    }

    #[tokio::test]
    async fn collection_subscription_is_ordered() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mut sub = Subscription::new(store.clone(), Query::ordered("costumes", "voteCount", Direction::Desc));
        assert_eq!(sub.next().await.unwrap().unwrap(), Snapshot::Docs(vec![]));

        store.set("costumes", "a", json!({"voteCount": 1})).await.unwrap();
        let _ = sub.next().await.unwrap().unwrap();
        store.set("costumes", "b", json!({"voteCount": 3})).await.unwrap();

        let Snapshot::Docs(docs) = sub.next().await.unwrap().unwrap() else {
            panic!("expected a collection snapshot");
        };
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }
}
