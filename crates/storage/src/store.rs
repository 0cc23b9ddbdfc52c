// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed object store over one-file-per-key persistence

use serde::de::DeserializeOwned;
use serde::Serialize;
use stash_core::key::{self, KeyError};
use stash_core::LockManager;
use std::io;
use std::marker::PhantomData;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    InvalidKey(#[from] KeyError),
    #[error("no object stored under key '{0}'")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keyed object store persisting each object as one JSON file.
///
/// The filename is the key; writes are staged in a separate temp directory
/// and renamed into place, so a concurrent reader observes either the
/// complete prior object or the complete new one, never a partial write.
/// Every keyed operation runs under that key's exclusive lock: same-key
/// operations are serialized, distinct keys proceed in parallel.
///
/// One process per storage root. Sharing the directories with another
/// process (or a second store instance) is unsupported.
pub struct FileStore<T> {
    base_dir: PathBuf,
    temp_dir: PathBuf,
    locks: LockManager,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open a store rooted at `base_dir`, staging writes in `temp_dir`.
    ///
    /// Both directories are created if absent. `temp_dir` must live on the
    /// same filesystem as `base_dir`: the write protocol relies on rename
    /// between the two being atomic.
    pub async fn open(
        base_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let base_dir = base_dir.into();
        let temp_dir = temp_dir.into();
        tokio::fs::create_dir_all(&base_dir).await?;
        tokio::fs::create_dir_all(&temp_dir).await?;

        Ok(Self {
            base_dir,
            temp_dir,
            locks: LockManager::new(),
            _marker: PhantomData,
        })
    }

    /// Store `value` under `key`, replacing any existing object.
    ///
    /// The serialized bytes are written in full to the temp directory,
    /// synced, and only then renamed onto the final path.
    pub async fn store(&self, key: &str, value: &T) -> Result<(), StoreError> {
        key::validate(key)?;
        let bytes = serde_json::to_vec(value)?;
        let staged = self.temp_dir.join(key);
        let dest = self.base_dir.join(key);

        self.locks
            .run_exclusive(key, || async move {
                let written = async {
                    let mut file = tokio::fs::File::create(&staged).await?;
                    file.write_all(&bytes).await?;
                    file.sync_all().await?;
                    drop(file);
                    tokio::fs::rename(&staged, &dest).await?;
                    Ok::<_, StoreError>(())
                }
                .await;
                if written.is_err() {
                    // Best effort; the staging area must not accumulate
                    // partial files.
                    let _ = tokio::fs::remove_file(&staged).await;
                }
                written
            })
            .await?;

        debug!("Stored object: {}", key);
        Ok(())
    }

    /// Load the object stored under `key`.
    ///
    /// Fails with [`StoreError::NotFound`] if no object exists for the key
    /// at the time of the read.
    pub async fn load(&self, key: &str) -> Result<T, StoreError> {
        let path = self.base_dir.join(key);
        let owned = key.to_string();

        self.locks
            .run_exclusive(key, || async move {
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        return Err(StoreError::NotFound(owned));
                    }
                    Err(e) => return Err(e.into()),
                };
                Ok(serde_json::from_slice(&bytes)?)
            })
            .await
    }

    /// Delete the object stored under `key`, if present.
    ///
    /// Deleting a key with no stored object is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.base_dir.join(key);

        let removed = self
            .locks
            .run_exclusive(key, || async move {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(StoreError::Io(e)),
                }
            })
            .await?;

        if removed {
            debug!("Deleted object: {}", key);
        }
        Ok(())
    }

    /// Whether an object is currently stored under `key`.
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.base_dir.join(key);

        self.locks
            .run_exclusive(key, || async move {
                match tokio::fs::metadata(&path).await {
                    Ok(_) => Ok(true),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(StoreError::Io(e)),
                }
            })
            .await
    }

    /// Number of objects currently stored.
    ///
    /// Counted in one pass over the storage directory without locking, so
    /// the result is a best-effort snapshot under concurrent mutation.
    pub async fn count(&self) -> Result<usize, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;
        let mut total = 0usize;
        while entries.next_entry().await?.is_some() {
            total += 1;
        }
        Ok(total)
    }

    /// Objects from one enumeration pass over the storage directory,
    /// skipping the first `from` entries and returning at most `limit`
    /// objects (0 meaning unbounded).
    ///
    /// An entry deleted between enumeration and its load is silently
    /// skipped - deletes racing a listing are benign - and does not count
    /// against `limit`. Any other load failure propagates.
    pub async fn list(&self, from: usize, limit: usize) -> Result<Vec<T>, StoreError> {
        let mut items = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_dir).await?;
        let mut position = 0usize;

        while let Some(entry) = entries.next_entry().await? {
            let in_range = position >= from;
            position += 1;
            if !in_range {
                continue;
            }

            let name = entry.file_name();
            let Some(entry_key) = name.to_str() else {
                // Not one of ours; stored keys are always valid UTF-8.
                continue;
            };
            match self.load(entry_key).await {
                Ok(item) => items.push(item),
                Err(StoreError::NotFound(_)) => {} // deleted while listing
                Err(e) => return Err(e),
            }
            if limit > 0 && items.len() == limit {
                break;
            }
        }

        Ok(items)
    }

    /// Every object in the store. Equivalent to `list(0, 0)`.
    pub async fn list_all(&self) -> Result<Vec<T>, StoreError> {
        self.list(0, 0).await
    }

    /// Number of keys with an operation currently in flight.
    pub fn active_locks(&self) -> usize {
        self.locks.active_keys()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
