//! eventsync-storage: durable checkpoint stores for eventsync.
//!
//! Backends:
//! - [`file`]: one JSON document per indexer, replaced atomically
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//!
//! The in-memory store used by tests lives in `eventsync-core`.

pub mod file;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::FileCheckpointStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;
