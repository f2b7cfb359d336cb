//! Typed view of the document store for entries and votes.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    model::{Entry, Vote},
    store::{Direction, Doc, DocumentStore, Query, Snapshot, StoreResult, Subscription},
};

pub const ENTRIES: &str = "costumes";
pub const VOTES: &str = "votes";

const VOTE_COUNT: &str = "voteCount";
/// Upload instant as epoch milliseconds. RFC 3339 strings with offsets or
/// fractional seconds do not sort in time order, so lists order by this.
const UPLOADED_AT_MS: &str = "uploadedAtMs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrder {
    /// Gallery order.
    NewestFirst,
    /// Results order.
    MostVotes,
}

impl EntryOrder {
    fn field(self) -> (&'static str, Direction) {
        match self {
            EntryOrder::NewestFirst => (UPLOADED_AT_MS, Direction::Desc),
            EntryOrder::MostVotes => (VOTE_COUNT, Direction::Desc),
        }
    }
}

#[derive(Clone)]
pub struct EntryRepository {
    store: Arc<dyn DocumentStore>,
}

impl EntryRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list_entries(&self, order: EntryOrder) -> StoreResult<Vec<Entry>> {
        let (field, direction) = order.field();
        decode_entries(self.store.list(ENTRIES, field, direction).await?)
    }

    pub async fn get_entry(&self, owner_id: &str) -> StoreResult<Option<Entry>> {
        decode(self.store.get(ENTRIES, owner_id).await?)
    }

    pub async fn put_entry(&self, entry: &Entry) -> StoreResult<()> {
        let mut body = serde_json::to_value(entry)?;
        if let Value::Object(fields) = &mut body {
            fields.insert(UPLOADED_AT_MS.to_owned(), epoch_millis(entry.uploaded_at).into());
        }
        self.store.set(ENTRIES, &entry.id, body).await
    }

    /// Writes everything the owner may edit, leaving `uploadedAt` and
    /// `voteCount` as the store has them.
    pub async fn update_entry_details(&self, entry: &Entry) -> StoreResult<()> {
        let mut partial = serde_json::to_value(entry)?;
        if let Value::Object(fields) = &mut partial {
            fields.remove("uploadedAt");
            fields.remove(VOTE_COUNT);
        }
        self.store.update(ENTRIES, &entry.id, partial).await
    }

    pub async fn delete_entry(&self, owner_id: &str) -> StoreResult<()> {
        self.store.delete(ENTRIES, owner_id).await
    }

    pub async fn adjust_vote_count(&self, owner_id: &str, delta: i64) -> StoreResult<()> {
        self.store.increment(ENTRIES, owner_id, VOTE_COUNT, delta).await
    }

    pub async fn get_vote(&self, voter_id: &str) -> StoreResult<Option<Vote>> {
        decode(self.store.get(VOTES, voter_id).await?)
    }

    pub async fn put_vote(&self, vote: &Vote) -> StoreResult<()> {
        self.store.set(VOTES, &vote.voter_id, serde_json::to_value(vote)?).await
    }

    pub fn watch_entries(&self, order: EntryOrder) -> EntryFeed {
        let (field, direction) = order.field();
        EntryFeed(Subscription::new(self.store.clone(), Query::ordered(ENTRIES, field, direction)))
    }

    pub fn watch_vote(&self, voter_id: &str) -> VoteFeed {
        VoteFeed(Subscription::new(self.store.clone(), Query::document(VOTES, voter_id)))
    }
}

fn epoch_millis(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn decode<T: serde::de::DeserializeOwned>(body: Option<Value>) -> StoreResult<Option<T>> {
    Ok(match body {
        Some(body) => Some(serde_json::from_value(body)?),
        None => None,
    })
}

fn decode_entries(docs: Vec<Doc>) -> StoreResult<Vec<Entry>> {
    docs.into_iter()
        .map(|doc| Ok(serde_json::from_value(doc.body)?))
        .collect()
}

/// Live entry list.
pub struct EntryFeed(Subscription);

impl EntryFeed {
    pub async fn next(&mut self) -> Option<StoreResult<Vec<Entry>>> {
        let snapshot = self.0.next().await?;
        Some(snapshot.and_then(|snapshot| match snapshot {
            Snapshot::Docs(docs) => decode_entries(docs),
            Snapshot::Doc(doc) => decode_entries(doc.into_iter().collect()),
        }))
    }

    pub fn close(self) {
        self.0.close()
    }
}

/// Live view of one voter's vote record.
pub struct VoteFeed(Subscription);

impl VoteFeed {
    pub async fn next(&mut self) -> Option<StoreResult<Option<Vote>>> {
        let snapshot = self.0.next().await?;
        Some(snapshot.and_then(|snapshot| match snapshot {
            Snapshot::Doc(doc) => decode(doc.map(|d| d.body)),
            Snapshot::Docs(docs) => decode(docs.into_iter().next().map(|d| d.body)),
        }))
    }

    pub fn close(self) {
        self.0.close()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::{model::MediaKind, store::MemoryStore};

    fn entry(owner: &str, uploaded_minute: u8, votes: i64) -> Entry {
        let at = datetime!(2025-10-31 10:00 UTC) + time::Duration::minutes(uploaded_minute.into());
        Entry {
            id: owner.into(),
            owner_id: owner.into(),
            owner_display_name: owner.to_uppercase(),
            owner_photo_url: None,
            uploader_name: owner.to_uppercase(),
            costume_name: format!("{owner} costume"),
            position: "Aisle".into(),
            description: String::new(),
            media_url: format!("/media/costumes/{owner}/x.jpg"),
            media_kind: MediaKind::Image,
            uploaded_at: at,
            updated_at: at,
            vote_count: votes,
        }
    }

    #[tokio::test]
    async fn entries_come_back_in_requested_order() {
        let repo = EntryRepository::new(Arc::new(MemoryStore::new()));
        repo.put_entry(&entry("a", 1, 5)).await.unwrap();
        repo.put_entry(&entry("b", 2, 0)).await.unwrap();
        repo.put_entry(&entry("c", 3, 9)).await.unwrap();

        let newest: Vec<_> = repo.list_entries(EntryOrder::NewestFirst).await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(newest, ["c", "b", "a"]);

        let ranked: Vec<_> = repo.list_entries(EntryOrder::MostVotes).await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ranked, ["c", "a", "b"]);
    }

    #[tokio::test]
    async fn newest_first_follows_the_instant_not_the_text() {
        let repo = EntryRepository::new(Arc::new(MemoryStore::new()));
        let mut whole = entry("whole", 0, 0);
        whole.uploaded_at = datetime!(2025-10-31 10:00:00 UTC);
        let mut fraction = entry("fraction", 0, 0);
        fraction.uploaded_at = datetime!(2025-10-31 10:00:00.25 UTC);
        // 09:50 UTC, yet its text sorts last
        let mut eastern = entry("eastern", 0, 0);
        eastern.uploaded_at = datetime!(2025-10-31 16:50 +07:00);
        // 10:15 UTC, yet its text sorts first
        let mut western = entry("western", 0, 0);
        western.uploaded_at = datetime!(2025-10-31 06:15 -04:00);

        for e in [&whole, &fraction, &eastern, &western] {
            repo.put_entry(e).await.unwrap();
        }

        let newest: Vec<_> = repo.list_entries(EntryOrder::NewestFirst).await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(newest, ["western", "fraction", "whole", "eastern"]);
    }

    #[tokio::test]
    async fn detail_updates_keep_counter_and_upload_time() {
        let repo = EntryRepository::new(Arc::new(MemoryStore::new()));
        let original = entry("a", 1, 4);
        repo.put_entry(&original).await.unwrap();

        let mut edited = entry("a", 30, 0);
        edited.costume_name = "Vampire".into();
        repo.update_entry_details(&edited).await.unwrap();

        let stored = repo.get_entry("a").await.unwrap().unwrap();
        assert_eq!(stored.costume_name, "Vampire");
        assert_eq!(stored.vote_count, 4);
        assert_eq!(stored.uploaded_at, original.uploaded_at);
        assert_eq!(stored.updated_at, edited.updated_at);
    }
}
