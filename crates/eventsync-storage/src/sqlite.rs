//! SQLite checkpoint store.
//!
//! One row per (chain, indexer). The recent-hash window is stored as a JSON
//! column next to `last_block`, so a save is a single upsert and the two can
//! never be observed out of step.
//!
//! # Usage
//! ```rust,no_run
//! use eventsync_storage::sqlite::SqliteCheckpointStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteCheckpointStore::open("./eventsync.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteCheckpointStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use eventsync_core::checkpoint::{Checkpoint, CheckpointStore};
use eventsync_core::error::IndexerError;
use eventsync_core::types::BlockRef;

/// SQLite-backed checkpoint storage.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./eventsync.db"`) or a full
    /// SQLite URL (`"sqlite:./eventsync.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every pooled connection would get its own empty database, so the pool
    /// is pinned to a single connection.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create the checkpoint table and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                chain_id     TEXT    NOT NULL,
                indexer_id   TEXT    NOT NULL,
                start_block  INTEGER NOT NULL,
                last_block   INTEGER,
                recent_json  TEXT    NOT NULL,
                updated_at   INTEGER NOT NULL,
                PRIMARY KEY (chain_id, indexer_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(())
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, chain_id: &str, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT chain_id, indexer_id, start_block, last_block, recent_json, updated_at
             FROM checkpoints WHERE chain_id = ? AND indexer_id = ?",
        )
        .bind(chain_id)
        .bind(indexer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let Some(r) = row else {
            return Ok(None);
        };
        let recent: Vec<BlockRef> = serde_json::from_str(&r.get::<String, _>("recent_json"))
            .map_err(|e| IndexerError::Storage(format!("corrupt recent_json for {chain_id}/{indexer_id}: {e}")))?;

        Ok(Some(Checkpoint {
            chain_id: r.get("chain_id"),
            indexer_id: r.get("indexer_id"),
            start_block: r.get::<i64, _>("start_block") as u64,
            last_block: r.get::<Option<i64>, _>("last_block").map(|b| b as u64),
            recent,
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        let recent_json =
            serde_json::to_string(&checkpoint.recent).map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "INSERT INTO checkpoints
             (chain_id, indexer_id, start_block, last_block, recent_json, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (chain_id, indexer_id) DO UPDATE SET
                start_block = excluded.start_block,
                last_block  = excluded.last_block,
                recent_json = excluded.recent_json,
                updated_at  = excluded.updated_at",
        )
        .bind(&checkpoint.chain_id)
        .bind(&checkpoint.indexer_id)
        .bind(checkpoint.start_block as i64)
        .bind(checkpoint.last_block.map(|b| b as i64))
        .bind(recent_json)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        debug!(
            chain_id = %checkpoint.chain_id,
            indexer_id = %checkpoint.indexer_id,
            last_block = ?checkpoint.last_block,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM checkpoints WHERE chain_id = ? AND indexer_id = ?")
            .bind(chain_id)
            .bind(indexer_id)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(indexer: &str, last: u64) -> Checkpoint {
        let mut cp = Checkpoint::genesis("ethereum", indexer, 1_000);
        let refs = (1_000..=last).map(|n| BlockRef::new(n, format!("0x{n:064x}")));
        cp.advance(last, refs, 8);
        cp
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();
        assert!(store.load("ethereum", "idx").await.unwrap().is_none());

        let cp = checkpoint("idx", 1_020);
        store.save(cp.clone()).await.unwrap();

        let loaded = store.load("ethereum", "idx").await.unwrap().unwrap();
        assert_eq!(loaded, cp);
        assert_eq!(loaded.recent.len(), 8);
    }

    #[tokio::test]
    async fn genesis_keeps_null_last_block() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();
        store.save(Checkpoint::genesis("ethereum", "fresh", 42)).await.unwrap();

        let loaded = store.load("ethereum", "fresh").await.unwrap().unwrap();
        assert_eq!(loaded.last_block, None);
        assert_eq!(loaded.next_block(), 42);
        assert!(loaded.recent.is_empty());
    }

    #[tokio::test]
    async fn checkpoint_upsert() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();

        store.save(checkpoint("idx", 1_003)).await.unwrap();
        let mut rewound = checkpoint("idx", 1_010);
        rewound.rewind_to(1_005);
        store.save(rewound.clone()).await.unwrap();

        let loaded = store.load("ethereum", "idx").await.unwrap().unwrap();
        assert_eq!(loaded.last_block, Some(1_005));
        assert_eq!(loaded.recent, rewound.recent);
    }

    #[tokio::test]
    async fn indexers_are_isolated() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();
        store.save(checkpoint("a", 1_001)).await.unwrap();
        store.save(checkpoint("b", 1_002)).await.unwrap();

        store.delete("ethereum", "a").await.unwrap();
        assert!(store.load("ethereum", "a").await.unwrap().is_none());
        assert_eq!(
            store.load("ethereum", "b").await.unwrap().unwrap().last_block,
            Some(1_002)
        );
    }

    #[tokio::test]
    async fn file_backed_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventsync.db");
        let path = path.to_str().unwrap();
        {
            let store = SqliteCheckpointStore::open(path).await.unwrap();
            store.save(checkpoint("idx", 1_004)).await.unwrap();
        }
        let store = SqliteCheckpointStore::open(path).await.unwrap();
        let loaded = store.load("ethereum", "idx").await.unwrap().unwrap();
        assert_eq!(loaded.last_block, Some(1_004));
    }
}
