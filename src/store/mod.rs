//! File-system backed, time-partitioned document store.
//!
//! Layout: `{root}/{kind}/{year}/{month}/{day}/{hour}.json`, one JSON document
//! per [`PartitionKey`]. Writes go to a hidden temp file in the leaf directory
//! and are renamed over the target, so a concurrent reader sees either the old
//! or the new document, never a partial one. Writing the same key twice
//! replaces the first document.
//!
//! The store does not arbitrate between processes writing the same key; the
//! scraper and analyzer each own their kinds and run one cycle at a time.

pub mod partition;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub use partition::{hours, truncate_to_day, truncate_to_hour, DataKind, PartitionKey};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write partition {key}: {source}")]
    PartitionWrite { key: PartitionKey, source: io::Error },

    #[error("failed to read partition {key}: {source}")]
    PartitionRead { key: PartitionKey, source: io::Error },

    #[error("partition {key} does not hold a valid document: {source}")]
    Corrupt { key: PartitionKey, source: serde_json::Error },

    #[error("failed to encode document for {key}: {source}")]
    Encode { key: PartitionKey, source: serde_json::Error },

    #[error("no document at {0}")]
    NotFound(PartitionKey),
}

#[derive(Debug, Clone)]
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &PartitionKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Atomically replace the document at `key`, creating partition levels as needed.
    pub async fn write<T: Serialize>(&self, key: &PartitionKey, document: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|source| StoreError::Encode { key: *key, source })?;
        let write_err = |source: io::Error| StoreError::PartitionWrite { key: *key, source };

        let dir = self.root.join(key.day_dir());
        fs::create_dir_all(&dir).await.map_err(write_err)?;

        let tmp = dir.join(format!(
            ".{:02}.{}.{}.tmp",
            key.hour(),
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(source) = write_synced(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(source));
        }
        if let Err(source) = fs::rename(&tmp, self.path_for(key)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(source));
        }

        debug!(partition = %key, bytes = bytes.len(), "partition written");
        Ok(())
    }

    pub async fn read<T: DeserializeOwned>(&self, key: &PartitionKey) -> Result<T, StoreError> {
        self.read_opt(key).await?.ok_or(StoreError::NotFound(*key))
    }

    /// Like [`read`](Self::read), but a missing partition is `Ok(None)`.
    pub async fn read_opt<T: DeserializeOwned>(&self, key: &PartitionKey) -> Result<Option<T>, StoreError> {
        let bytes = match fs::read(self.path_for(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::PartitionRead { key: *key, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { key: *key, source })
    }

    /// Every document of `kind` whose hour lies in `[from, to]`, oldest first.
    ///
    /// Walks hour by hour and skips whole days whose directory does not exist.
    /// Documents that fail to decode are logged and left out.
    pub async fn list_range<T: DeserializeOwned>(
        &self,
        kind: DataKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<(PartitionKey, T)>, StoreError> {
        let end = truncate_to_hour(to);
        let mut cursor = truncate_to_hour(from);
        let mut out = Vec::new();

        while cursor <= end {
            let key = PartitionKey::new(kind, cursor);
            let day_exists = fs::try_exists(self.root.join(key.day_dir()))
                .await
                .map_err(|source| StoreError::PartitionRead { key, source })?;
            if !day_exists {
                cursor = truncate_to_day(cursor) + TimeDelta::days(1);
                continue;
            }

            match self.read_opt::<T>(&key).await {
                Ok(Some(doc)) => out.push((key, doc)),
                Ok(None) => {}
                Err(StoreError::Corrupt { key, source }) => {
                    warn!(partition = %key, "Skipping unreadable partition: {source}");
                }
                Err(e) => return Err(e),
            }
            cursor += TimeDelta::hours(1);
        }

        Ok(out)
    }

    /// Most recent document of `kind` at or before `at`, searching back at most
    /// `max_hours_back` hours.
    pub async fn latest<T: DeserializeOwned>(
        &self,
        kind: DataKind,
        at: DateTime<Utc>,
        max_hours_back: i64,
    ) -> Result<Option<(PartitionKey, T)>, StoreError> {
        for back in 0..=max_hours_back {
            let key = PartitionKey::new(kind, at - hours(back));
            match self.read_opt::<T>(&key).await {
                Ok(Some(doc)) => return Ok(Some((key, doc))),
                Ok(None) => {}
                Err(StoreError::Corrupt { key, source }) => {
                    warn!(partition = %key, "Skipping unreadable partition: {source}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}
