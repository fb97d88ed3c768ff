//! Time-bounded cache of the last successful version check.
//!
//! Stored as a single JSON object:
//! `{"lastUpdateCheck": <epoch ms>, "latestVersion": <string|null>}`.
//! Every read failure degrades to "no cache"; the cache is an optimization
//! and never a correctness dependency.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::background::spawn_best_effort;
use crate::error::VersionError;

/// Validity window of a cached check.
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const CACHE_FILE: &str = "update-cache.json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCacheEntry {
    #[serde(rename = "lastUpdateCheck")]
    pub last_checked_at_epoch_ms: i64,
    #[serde(rename = "latestVersion")]
    pub latest_version: Option<String>,
}

impl VersionCacheEntry {
    /// `true` iff the entry is strictly younger than [`CACHE_TTL`] at `now_ms`.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        let ttl_ms = CACHE_TTL.as_millis() as i64;
        now_ms.saturating_sub(self.last_checked_at_epoch_ms) < ttl_ms
    }
}

pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone)]
pub struct VersionCache {
    path: PathBuf,
}

impl VersionCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache stored in `config_dir` (the application's own config directory).
    pub fn in_dir(config_dir: &Path) -> Self {
        Self::new(config_dir.join(CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The persisted entry, or `None` when missing or unreadable.
    pub async fn get_cached_update(&self) -> Option<VersionCacheEntry> {
        match self.read_entry().await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(path = %self.path.display(), error = %err, "ignoring update cache");
                None
            }
        }
    }

    async fn read_entry(&self) -> Result<Option<VersionCacheEntry>, VersionError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(VersionError::CacheCorrupt(err.to_string())),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| VersionError::CacheCorrupt(err.to_string()))
    }

    pub async fn is_cache_valid(&self) -> bool {
        self.is_cache_valid_at(now_epoch_ms()).await
    }

    pub async fn is_cache_valid_at(&self, now_ms: i64) -> bool {
        self.get_cached_update()
            .await
            .is_some_and(|entry| entry.is_valid_at(now_ms))
    }

    /// Record `latest_version` as checked now. Failures are logged and dropped.
    pub async fn set_cached_update(&self, latest_version: Option<String>) {
        if let Err(err) = self.write_entry(latest_version, now_epoch_ms()).await {
            tracing::debug!(path = %self.path.display(), error = %format!("{err:#}"), "failed to write update cache");
        }
    }

    /// Same as [`Self::set_cached_update`] but detached from the caller.
    pub fn store_in_background(&self, latest_version: Option<String>) -> Option<JoinHandle<()>> {
        let cache = self.clone();
        spawn_best_effort("update-cache", async move {
            cache.write_entry(latest_version, now_epoch_ms()).await
        })
    }

    /// Write the entry atomically (tmp + rename).
    ///
    /// The stored timestamp never moves backwards: an existing entry with a
    /// later timestamp keeps it.
    pub async fn write_entry(
        &self,
        latest_version: Option<String>,
        now_ms: i64,
    ) -> anyhow::Result<()> {
        let previous = self.get_cached_update().await;
        let last_checked = previous
            .map(|p| p.last_checked_at_epoch_ms.max(now_ms))
            .unwrap_or(now_ms);
        let entry = VersionCacheEntry {
            last_checked_at_epoch_ms: last_checked,
            latest_version,
        };

        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Cache path has no parent: {}", self.path.display()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;

        let bytes = serde_json::to_vec(&entry).context("Failed to serialize update cache")?;
        let tmp_path = parent.join(format!(
            "{}.{}.{}.tmp",
            CACHE_FILE,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp_path, bytes)
            .await
            .with_context(|| format!("Failed to write tmp cache: {}", tmp_path.display()))?;
        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(anyhow::Error::new(err)
                .context(format!("Failed to replace cache: {}", self.path.display())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    #[test]
    fn ttl_boundary_is_exclusive() {
        let entry = VersionCacheEntry {
            last_checked_at_epoch_ms: 1_000_000,
            latest_version: None,
        };
        assert!(entry.is_valid_at(1_000_000));
        assert!(entry.is_valid_at(1_000_000 + DAY_MS - 1));
        assert!(!entry.is_valid_at(1_000_000 + DAY_MS));
        assert!(!entry.is_valid_at(1_000_000 + 2 * DAY_MS));
    }

    #[test]
    fn entry_uses_wire_field_names() {
        let json = serde_json::to_value(VersionCacheEntry {
            last_checked_at_epoch_ms: 42,
            latest_version: Some("1.2.3".into()),
        })
        .expect("VersionCacheEntry serialization should succeed");
        assert_eq!(json, serde_json::json!({"lastUpdateCheck": 42, "latestVersion": "1.2.3"}));
    }

    #[tokio::test]
    async fn timestamp_never_moves_backwards() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let cache = VersionCache::in_dir(tmp.path());

        cache
            .write_entry(Some("1.0.0".into()), 5_000)
            .await
            .expect("write should succeed");
        cache
            .write_entry(Some("1.1.0".into()), 4_000)
            .await
            .expect("write should succeed");

        let entry = cache.get_cached_update().await.expect("entry should exist");
        assert_eq!(entry.last_checked_at_epoch_ms, 5_000);
        assert_eq!(entry.latest_version.as_deref(), Some("1.1.0"));
    }
}
