use async_trait::async_trait;
use serde_json::Value;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::sync::broadcast;
use tracing::info;

use crate::include_res;

use super::{Change, ChangeFeed, Direction, Doc, DocumentStore, StoreError, StoreResult};

/// Documents kept as JSON text in one SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;

        let store = Self::from_pool(db_pool);
        store.migrate().await?;
        info!("document store ready at {url}");
        Ok(store)
    }

    pub fn from_pool(db_pool: SqlitePool) -> Self {
        Self {
            db_pool,
            feed: ChangeFeed::default(),
        }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(include_res!(str, "/schema.sql"))
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }
}

fn json_path(field: &str) -> String {
    format!("$.{field}")
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT body FROM documents WHERE collection=? AND id=?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(match row {
            Some((body,)) => Some(serde_json::from_str(&body)?),
            None => None,
        })
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection,id,body) VALUES (?,?,?) \
             ON CONFLICT(collection,id) DO UPDATE SET body=excluded.body",
        )
        .bind(collection)
        .bind(id)
        .bind(doc.to_string())
        .execute(&self.db_pool)
        .await?;

        self.feed.publish(collection, id);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> StoreResult<()> {
        let result = sqlx::query("UPDATE documents SET body=json_patch(body, ?) WHERE collection=? AND id=?")
            .bind(partial.to_string())
            .bind(collection)
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        self.feed.publish(collection, id);
        Ok(())
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, delta: i64) -> StoreResult<()> {
        let path = json_path(field);
        let result = sqlx::query(
            "UPDATE documents SET body=json_set(body, ?, coalesce(json_extract(body, ?), 0) + ?) \
             WHERE collection=? AND id=?",
        )
        .bind(&path)
        .bind(&path)
        .bind(delta)
        .bind(collection)
        .bind(id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        self.feed.publish(collection, id);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection=? AND id=?")
            .bind(collection)
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() > 0 {
            self.feed.publish(collection, id);
        }
        Ok(())
    }

    async fn list(&self, collection: &str, order_by: &str, direction: Direction) -> StoreResult<Vec<Doc>> {
        let direction = match direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        let sql = format!(
            "SELECT id,body FROM documents WHERE collection=? ORDER BY json_extract(body, ?) {direction}, id ASC"
        );

        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(collection)
            .bind(json_path(order_by))
            .fetch_all(&self.db_pool)
            .await?;

        rows.into_iter()
            .map(|(id, body)| {
                Ok(Doc {
                    id,
                    body: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }
}
