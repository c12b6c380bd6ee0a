//! Persistent video catalogue backed by a single SQLite table.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{BotError, Result};

/// Longest caption (in characters) a video may carry.
pub const MAX_CAPTION_LEN: usize = 100;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id TEXT NOT NULL UNIQUE,
    caption TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

const COLUMNS: &str = "id, file_id, caption, created_at";

/// A video previously uploaded by the administrator.
#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct Video {
    pub id: i64,
    /// Telegram file id, unique per video.
    pub file_id: String,
    pub caption: String,
    pub created_at: DateTime<Utc>,
}

/// Returns an error when `caption` is over [`MAX_CAPTION_LEN`] characters.
pub fn validate_caption(caption: &str) -> Result<()> {
    let len = caption.chars().count();
    if len > MAX_CAPTION_LEN {
        return Err(BotError::Validation { len });
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if needed) the database at `url` and ensures the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::with_pool(pool).await
    }

    /// A private database living as long as the returned store. Used by tests.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to `:memory:` is its own database, so pin the pool to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Creates the video for `file_id`, or replaces its caption if it already exists.
    ///
    /// The boolean is `true` when a new record was inserted.
    pub async fn upsert_by_file_id(&self, file_id: &str, caption: &str) -> Result<(Video, bool)> {
        validate_caption(caption)?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Video>(&format!(
            "UPDATE videos SET caption = ?1 WHERE file_id = ?2 RETURNING {COLUMNS}"
        ))
        .bind(caption)
        .bind(file_id)
        .fetch_optional(&mut *tx)
        .await?;

        let result = match updated {
            Some(video) => (video, false),
            None => {
                // The conflict clause keeps file_id unique even if another writer got here first.
                let video = sqlx::query_as::<_, Video>(&format!(
                    "INSERT INTO videos (file_id, caption, created_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(file_id) DO UPDATE SET caption = excluded.caption
                     RETURNING {COLUMNS}"
                ))
                .bind(file_id)
                .bind(caption)
                .bind(Utc::now())
                .fetch_one(&mut *tx)
                .await?;
                (video, true)
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    /// Oldest video whose caption equals `caption` exactly.
    pub async fn find_by_exact_caption(&self, caption: &str) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {COLUMNS} FROM videos WHERE caption = ?1
             ORDER BY created_at, id LIMIT 1"
        ))
        .bind(caption)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    /// Oldest video whose caption starts with `prefix` (case-sensitive).
    pub async fn find_by_caption_prefix(&self, prefix: &str) -> Result<Option<Video>> {
        // substr/length count characters, and unlike LIKE there are no wildcards to escape.
        let video = sqlx::query_as::<_, Video>(&format!(
            "SELECT {COLUMNS} FROM videos WHERE substr(caption, 1, length(?1)) = ?1
             ORDER BY created_at, id LIMIT 1"
        ))
        .bind(prefix)
        .fetch_optional(&self.pool)
        .await?;
        Ok(video)
    }

    /// Every video in insertion order.
    pub async fn list_all(&self) -> Result<Vec<Video>> {
        let videos = sqlx::query_as::<_, Video>(&format!("SELECT {COLUMNS} FROM videos ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(videos)
    }

    /// Number of stored videos.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Closes the pool; every later operation fails with a store error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_then_updates_in_place() {
        let store = Store::in_memory().await.unwrap();

        let (first, created) = store.upsert_by_file_id("file-1", "Old caption").await.unwrap();
        assert!(created);

        let (second, created) = store.upsert_by_file_id("file-1", "New caption").await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.caption, "New caption");

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].caption, "New caption");
    }

    #[tokio::test]
    async fn upsert_rejects_long_caption() {
        let store = Store::in_memory().await.unwrap();
        let caption = "x".repeat(MAX_CAPTION_LEN + 1);

        let err = store.upsert_by_file_id("file-1", &caption).await.unwrap_err();
        assert!(matches!(err, BotError::Validation { len } if len == MAX_CAPTION_LEN + 1));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn caption_limit_counts_characters_not_bytes() {
        let store = Store::in_memory().await.unwrap();
        let caption = "я".repeat(MAX_CAPTION_LEN);

        assert!(store.upsert_by_file_id("file-1", &caption).await.is_ok());
    }

    #[tokio::test]
    async fn exact_match_prefers_equal_caption() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_by_file_id("long", "Cats and Dogs").await.unwrap();
        store.upsert_by_file_id("short", "Cats").await.unwrap();

        let video = store.find_by_exact_caption("Cats").await.unwrap().unwrap();
        assert_eq!(video.file_id, "short");
        assert!(store.find_by_exact_caption("Dogs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefix_match_finds_longer_caption() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_by_file_id("summer", "Summer Vacation 2023").await.unwrap();

        let video = store.find_by_caption_prefix("Summer").await.unwrap().unwrap();
        assert_eq!(video.file_id, "summer");
        assert!(store.find_by_caption_prefix("summer").await.unwrap().is_none());
        assert!(store.find_by_caption_prefix("Vacation").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefix_match_has_no_wildcards() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_by_file_id("pct", "100% fun").await.unwrap();

        assert!(store.find_by_caption_prefix("1_0").await.unwrap().is_none());
        assert!(store.find_by_caption_prefix("100%").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_captions_resolve_to_oldest() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_by_file_id("first", "Same").await.unwrap();
        store.upsert_by_file_id("second", "Same").await.unwrap();

        let exact = store.find_by_exact_caption("Same").await.unwrap().unwrap();
        assert_eq!(exact.file_id, "first");
        let prefix = store.find_by_caption_prefix("Sa").await.unwrap().unwrap();
        assert_eq!(prefix.file_id, "first");
    }

    #[tokio::test]
    async fn closed_store_reports_store_errors() {
        let store = Store::in_memory().await.unwrap();
        store.close().await;

        assert!(matches!(store.list_all().await, Err(BotError::Store(_))));
        assert!(matches!(
            store.upsert_by_file_id("f", "Cats").await,
            Err(BotError::Store(_))
        ));
    }

    #[tokio::test]
    async fn list_all_keeps_insertion_order() {
        let store = Store::in_memory().await.unwrap();
        for (file_id, caption) in [("c", "Zebra"), ("a", "Apple"), ("b", "Mango")] {
            store.upsert_by_file_id(file_id, caption).await.unwrap();
        }
        store.upsert_by_file_id("c", "Zebra renamed").await.unwrap();

        let captions: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.caption)
            .collect();
        assert_eq!(captions, ["Zebra renamed", "Apple", "Mango"]);
    }
}
