//! JSON file checkpoint store.
//!
//! Each (chain, indexer) pair is stored as `<dir>/<chain>-<indexer>.json`.
//! A save writes a sibling temp file, fsyncs it, then renames it over the
//! old document, so a crash leaves either the old or the new checkpoint.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use eventsync_core::checkpoint::{Checkpoint, CheckpointStore};
use eventsync_core::error::IndexerError;

/// Checkpoint store backed by a directory of JSON files.
pub struct FileCheckpointStore {
    dir: PathBuf,
    // Serializes temp-file writes so two saves never share a temp path.
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| IndexerError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document holding the given checkpoint.
    pub fn path_for(&self, chain_id: &str, indexer_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}.json", sanitize(chain_id), sanitize(indexer_id)))
    }
}

/// Keep file names portable: anything outside `[A-Za-z0-9._]` becomes `_`.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
        .collect()
}

fn storage_err(path: &Path, e: impl std::fmt::Display) -> IndexerError {
    IndexerError::Storage(format!("{}: {e}", path.display()))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, chain_id: &str, indexer_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let path = self.path_for(chain_id, indexer_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(&path, e)),
        };
        let checkpoint: Checkpoint = serde_json::from_slice(&bytes).map_err(|e| storage_err(&path, e))?;
        if checkpoint.chain_id != chain_id || checkpoint.indexer_id != indexer_id {
            return Err(storage_err(
                &path,
                format!(
                    "holds checkpoint for {}/{}, expected {chain_id}/{indexer_id}",
                    checkpoint.chain_id, checkpoint.indexer_id
                ),
            ));
        }
        Ok(Some(checkpoint))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        let path = self.path_for(&checkpoint.chain_id, &checkpoint.indexer_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&checkpoint).map_err(|e| storage_err(&path, e))?;

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::File::create(&tmp).await.map_err(|e| storage_err(&tmp, e))?;
        file.write_all(&body).await.map_err(|e| storage_err(&tmp, e))?;
        file.sync_all().await.map_err(|e| storage_err(&tmp, e))?;
        drop(file);
        tokio::fs::rename(&tmp, &path).await.map_err(|e| storage_err(&path, e))?;

        debug!(
            chain_id = %checkpoint.chain_id,
            indexer_id = %checkpoint.indexer_id,
            last_block = ?checkpoint.last_block,
            window = checkpoint.recent.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError> {
        let path = self.path_for(chain_id, indexer_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(&path, e)),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
