//! Timeout-bounded "is there a newer version?" resolution.
//!
//! The remote check runs as its own task and races the timeout. A check that
//! loses the race is not cancelled: it is handed back as a [`PendingCheck`]
//! so the caller can decide what a late answer is worth.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::VersionError;

use super::cache::{VersionCache, now_epoch_ms};
use super::source::{VersionSource, is_newer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckState {
    Idle,
    Checking,
    Resolved,
    TimedOut,
    Failed,
}

impl CheckState {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckState::Idle => "idle",
            CheckState::Checking => "checking",
            CheckState::Resolved => "resolved",
            CheckState::TimedOut => "timed-out",
            CheckState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CheckState::Resolved | CheckState::TimedOut | CheckState::Failed
        )
    }
}

/// A remote check that outlived the timeout.
#[derive(Debug)]
pub struct PendingCheck {
    handle: JoinHandle<anyhow::Result<Option<String>>>,
}

impl PendingCheck {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the abandoned check. `None` when it failed or panicked.
    pub async fn finish(self) -> Option<Option<String>> {
        match self.handle.await {
            Ok(Ok(update)) => Some(update),
            Ok(Err(err)) => {
                tracing::debug!(error = %format!("{err:#}"), "late version check failed");
                None
            }
            Err(err) => {
                tracing::debug!(error = %err, "late version check aborted");
                None
            }
        }
    }
}

#[derive(Debug)]
pub struct Resolution {
    pub update_available: Option<String>,
    pub state: CheckState,
    /// Present only when `state` is [`CheckState::TimedOut`].
    pub pending: Option<PendingCheck>,
}

#[derive(Clone)]
pub struct UpdateResolver {
    source: Arc<dyn VersionSource>,
    cache: VersionCache,
    current_version: String,
    timeout: Duration,
}

impl std::fmt::Debug for UpdateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateResolver")
            .field("cache", &self.cache)
            .field("current_version", &self.current_version)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl UpdateResolver {
    pub fn new(
        source: Arc<dyn VersionSource>,
        cache: VersionCache,
        current_version: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            current_version: current_version.into(),
            timeout,
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cache(&self) -> &VersionCache {
        &self.cache
    }

    /// Resolve the available update within the configured timeout.
    ///
    /// A valid cached value is the fallback for a failed or slow remote. A
    /// successful remote answer is persisted in the background, including
    /// one that arrives after the timeout.
    pub async fn resolve(&self) -> Resolution {
        let deadline = Instant::now() + self.timeout;
        let mut remote = self.spawn_remote_check();

        let fallback = tokio::time::timeout_at(deadline, self.cached_fallback())
            .await
            .unwrap_or_default();

        match tokio::time::timeout_at(deadline, &mut remote).await {
            Ok(Ok(Ok(update))) => Resolution {
                update_available: update,
                state: CheckState::Resolved,
                pending: None,
            },
            Ok(Ok(Err(err))) => {
                let err = VersionError::RemoteUnavailable(format!("{err:#}"));
                tracing::debug!(error = %err, "using cached version");
                Resolution {
                    update_available: fallback,
                    state: CheckState::Failed,
                    pending: None,
                }
            }
            Ok(Err(join_err)) => {
                let err = VersionError::RemoteUnavailable(join_err.to_string());
                tracing::debug!(error = %err, "using cached version");
                Resolution {
                    update_available: fallback,
                    state: CheckState::Failed,
                    pending: None,
                }
            }
            Err(_) => {
                let err = VersionError::Timeout(self.timeout);
                tracing::debug!(error = %err, "using cached version");
                Resolution {
                    update_available: fallback,
                    state: CheckState::TimedOut,
                    pending: Some(PendingCheck { handle: remote }),
                }
            }
        }
    }

    /// The cached newer version, if the cache is valid and names one.
    pub async fn cached_fallback(&self) -> Option<String> {
        let entry = self.cache.get_cached_update().await?;
        if !entry.is_valid_at(now_epoch_ms()) {
            return None;
        }
        entry
            .latest_version
            .filter(|latest| is_newer(latest, &self.current_version))
    }

    fn spawn_remote_check(&self) -> JoinHandle<anyhow::Result<Option<String>>> {
        let source = Arc::clone(&self.source);
        let cache = self.cache.clone();
        let current = self.current_version.clone();
        tokio::spawn(async move {
            let update = source.check_for_updates(&current).await?;
            // No update means the current version is the latest one.
            cache.store_in_background(Some(update.clone().unwrap_or(current)));
            Ok::<_, anyhow::Error>(update)
        })
    }
}
