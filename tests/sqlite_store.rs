use std::sync::Arc;

use costume_contest::{
    clock::FixedClock,
    model::{Entry, MediaKind},
    repo::{EntryOrder, EntryRepository},
    schedule::Window,
    store::{Direction, DocumentStore, SqliteStore, StoreError},
    voting::VotingWorkflow,
};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use time::{macros::datetime, Duration};

async fn store() -> SqliteStore {
    // every pooled connection to :memory: is its own database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteStore::from_pool(db_pool);
    store.migrate().await.unwrap();
    store
}

#[tokio::test]
async fn set_get_update_delete() {
    let store = store().await;
    assert_eq!(store.get("costumes", "a").await.unwrap(), None);

    store.set("costumes", "a", json!({"costumeName": "Witch", "voteCount": 2})).await.unwrap();
    store.update("costumes", "a", json!({"costumeName": "Good Witch"})).await.unwrap();
    assert_eq!(
        store.get("costumes", "a").await.unwrap(),
        Some(json!({"costumeName": "Good Witch", "voteCount": 2}))
    );

    let missing = store.update("costumes", "zz", json!({"x": 1})).await.unwrap_err();
    assert!(matches!(missing, StoreError::NotFound { .. }));

    store.delete("costumes", "a").await.unwrap();
    assert_eq!(store.get("costumes", "a").await.unwrap(), None);
}

#[tokio::test]
async fn increment_counts_missing_fields_from_zero() {
    let store = store().await;
    store.set("costumes", "a", json!({"costumeName": "Witch"})).await.unwrap();

    store.increment("costumes", "a", "voteCount", 1).await.unwrap();
    store.increment("costumes", "a", "voteCount", 1).await.unwrap();
    store.increment("costumes", "a", "voteCount", -1).await.unwrap();
    assert_eq!(store.get("costumes", "a").await.unwrap().unwrap()["voteCount"], json!(1));

    let missing = store.increment("costumes", "zz", "voteCount", 1).await.unwrap_err();
    assert!(matches!(missing, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn list_orders_numerically_with_id_ties() {
    let store = store().await;
    for (id, votes) in [("b", 2), ("a", 2), ("c", 10), ("d", 0)] {
        store.set("costumes", id, json!({"voteCount": votes})).await.unwrap();
    }
    store.set("votes", "x", json!({"voteCount": 99})).await.unwrap();

    let ids = |docs: Vec<costume_contest::store::Doc>| docs.into_iter().map(|d| d.id).collect::<Vec<_>>();
    assert_eq!(ids(store.list("costumes", "voteCount", Direction::Desc).await.unwrap()), ["c", "a", "b", "d"]);
    assert_eq!(ids(store.list("costumes", "voteCount", Direction::Asc).await.unwrap()), ["d", "a", "b", "c"]);
}

#[tokio::test]
async fn writes_are_published() {
    let store = store().await;
    let mut changes = store.changes();

    store.set("votes", "b", json!({"targetOwnerId": "a"})).await.unwrap();
    let change = changes.recv().await.unwrap();
    assert_eq!((change.collection.as_str(), change.id.as_str()), ("votes", "b"));
}

#[tokio::test]
async fn vote_transfer_on_sqlite() {
    let store: Arc<dyn DocumentStore> = Arc::new(store().await);
    let repo = EntryRepository::new(store);
    let at = datetime!(2025-10-31 20:00 UTC);

    for (owner, minute) in [("a", 0), ("c", 1)] {
        repo.put_entry(&Entry {
            id: owner.into(),
            owner_id: owner.into(),
            owner_display_name: owner.into(),
            owner_photo_url: None,
            uploader_name: owner.into(),
            costume_name: "Vampire".into(),
            position: "Balcony".into(),
            description: String::new(),
            media_url: format!("/media/{owner}.jpg"),
            media_kind: MediaKind::Image,
            uploaded_at: at + Duration::minutes(minute),
            updated_at: at,
            vote_count: 0,
        })
        .await
        .unwrap();
    }

    let window = Window::new(at - Duration::hours(1), at + Duration::hours(1)).unwrap();
    let voting = VotingWorkflow::new(repo.clone(), Arc::new(FixedClock::new(at)), window);
    voting.cast_vote("b", "a").await.unwrap();
    voting.cast_vote("b", "c").await.unwrap();

    let newest = repo.list_entries(EntryOrder::NewestFirst).await.unwrap();
    assert_eq!(newest.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), ["c", "a"]);

    let top = repo.list_entries(EntryOrder::MostVotes).await.unwrap();
    assert_eq!((top[0].id.as_str(), top[0].vote_count), ("c", 1));
    assert_eq!((top[1].id.as_str(), top[1].vote_count), ("a", 0));
}

#[tokio::test]
async fn newest_first_on_sqlite_uses_the_instant() {
    let store: Arc<dyn DocumentStore> = Arc::new(store().await);
    let repo = EntryRepository::new(store);

    for (owner, uploaded_at) in [
        ("whole", datetime!(2025-10-31 10:00:00 UTC)),
        ("fraction", datetime!(2025-10-31 10:00:00.25 UTC)),
        ("eastern", datetime!(2025-10-31 16:50 +07:00)),
        ("western", datetime!(2025-10-31 06:15 -04:00)),
    ] {
        repo.put_entry(&Entry {
            id: owner.into(),
            owner_id: owner.into(),
            owner_display_name: owner.into(),
            owner_photo_url: None,
            uploader_name: owner.into(),
            costume_name: "Mummy".into(),
            position: "Stage".into(),
            description: String::new(),
            media_url: format!("/media/{owner}.jpg"),
            media_kind: MediaKind::Video,
            uploaded_at,
            updated_at: uploaded_at,
            vote_count: 0,
        })
        .await
        .unwrap();
    }

    let newest = repo.list_entries(EntryOrder::NewestFirst).await.unwrap();
    assert_eq!(
        newest.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
        ["western", "fraction", "whole", "eastern"]
    );
}
