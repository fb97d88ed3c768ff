//! Stale-while-revalidate environment snapshot.
//!
//! Each refresh joins the update resolver and the global-install probe,
//! both bounded by the resolver's timeout, and publishes the result through
//! a `watch` channel. Snapshots are replaced wholesale, never patched.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::background::spawn_best_effort;
use crate::version::{CheckState, PendingCheck, UpdateResolver};

use super::probe::GlobalInstallProbe;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSnapshot {
    pub update_available: Option<String>,
    pub current_version: String,
    pub is_global: bool,
    pub is_loading: bool,
    pub check_state: CheckState,
}

impl EnvironmentSnapshot {
    /// Snapshot before any check has run.
    pub fn initial(current_version: impl Into<String>) -> Self {
        Self {
            update_available: None,
            current_version: current_version.into(),
            is_global: false,
            is_loading: false,
            check_state: CheckState::Idle,
        }
    }

    /// The message a front end should show for this snapshot, if any.
    pub fn notice(&self) -> Option<Notice> {
        if self.is_loading {
            return None;
        }
        match (&self.update_available, self.is_global) {
            (Some(latest), is_global) => Some(Notice::UpdateAvailable {
                current: self.current_version.clone(),
                latest: latest.clone(),
                is_global,
            }),
            (None, false) => Some(Notice::InstallGlobally),
            (None, true) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A newer release exists; `is_global` selects update vs. install advice.
    UpdateAvailable {
        current: String,
        latest: String,
        is_global: bool,
    },
    /// Running from a non-global location.
    InstallGlobally,
}

/// Owns the current [`EnvironmentSnapshot`] and refreshes it on demand.
///
/// Cheap to clone; clones share the same snapshot channel.
#[derive(Clone)]
pub struct EnvironmentMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    resolver: UpdateResolver,
    probe: Arc<dyn GlobalInstallProbe>,
    publish_late_results: bool,
    tx: watch::Sender<EnvironmentSnapshot>,
    // Bumped by every refresh; results from older refreshes are stale.
    generation: AtomicU64,
}

impl std::fmt::Debug for EnvironmentMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentMonitor")
            .field("resolver", &self.inner.resolver)
            .field("publish_late_results", &self.inner.publish_late_results)
            .field("snapshot", &*self.inner.tx.borrow())
            .finish_non_exhaustive()
    }
}

impl EnvironmentMonitor {
    pub fn new(
        resolver: UpdateResolver,
        probe: Arc<dyn GlobalInstallProbe>,
        publish_late_results: bool,
    ) -> Self {
        let (tx, _rx) = watch::channel(EnvironmentSnapshot::initial(resolver.current_version()));
        Self {
            inner: Arc::new(Inner {
                resolver,
                probe,
                publish_late_results,
                tx,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EnvironmentSnapshot> {
        self.inner.tx.subscribe()
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> EnvironmentSnapshot {
        self.inner.tx.borrow().clone()
    }

    /// Re-run both checks and publish the outcome.
    ///
    /// The previous snapshot is republished with `is_loading = true` first.
    /// Returns the computed snapshot even when a newer refresh has already
    /// superseded it (in which case it is not published).
    pub async fn refresh(&self) -> EnvironmentSnapshot {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.tx.send_modify(|current| {
            *current = EnvironmentSnapshot {
                is_loading: true,
                check_state: CheckState::Checking,
                ..current.clone()
            };
        });

        let resolver = &self.inner.resolver;
        let (resolution, is_global) = tokio::join!(
            resolver.resolve(),
            probe_global(Arc::clone(&self.inner.probe), resolver.timeout()),
        );

        let snapshot = EnvironmentSnapshot {
            update_available: resolution.update_available,
            current_version: resolver.current_version().to_string(),
            is_global,
            is_loading: false,
            check_state: resolution.state,
        };
        self.publish_if_current(generation, snapshot.clone());

        if let Some(pending) = resolution.pending {
            if self.inner.publish_late_results {
                self.publish_when_finished(pending, generation);
            } else {
                tracing::debug!("discarding version check that outlived the timeout");
            }
        }
        snapshot
    }

    /// Run [`Self::refresh`] detached from the caller.
    pub fn refresh_in_background(&self) -> Option<JoinHandle<()>> {
        let monitor = self.clone();
        spawn_best_effort("environment-refresh", async move {
            monitor.refresh().await;
            Ok(())
        })
    }

    /// Refresh now and then every `every` until the handle is aborted.
    pub fn spawn_periodic(&self, every: Duration) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let monitor = self.clone();
        Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                monitor.refresh().await;
            }
        }))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn publish_if_current(&self, generation: u64, snapshot: EnvironmentSnapshot) -> bool {
        self.inner.tx.send_if_modified(|current| {
            if !self.is_current(generation) {
                return false;
            }
            *current = snapshot;
            true
        })
    }

    /// Publish a late remote answer as a new snapshot, unless a newer
    /// refresh has started in the meantime.
    fn publish_when_finished(&self, pending: PendingCheck, generation: u64) {
        let monitor = self.clone();
        spawn_best_effort("late-version-check", async move {
            let Some(update) = pending.finish().await else {
                return Ok(());
            };
            let published = monitor.snapshot();
            let late = EnvironmentSnapshot {
                update_available: update,
                check_state: CheckState::Resolved,
                ..published
            };
            if monitor.publish_if_current(generation, late) {
                tracing::debug!("published late version check");
            } else {
                tracing::debug!("late version check superseded by a newer refresh");
            }
            Ok(())
        });
    }
}

/// Run the blocking probe with a deadline. Errors, panics and timeouts all
/// count as "not global".
async fn probe_global(probe: Arc<dyn GlobalInstallProbe>, timeout: Duration) -> bool {
    let task = tokio::task::spawn_blocking(move || probe.is_globally_installed());
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(is_global))) => is_global,
        Ok(Ok(Err(err))) => {
            tracing::debug!(error = %format!("{err:#}"), "global install probe failed");
            false
        }
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "global install probe panicked");
            false
        }
        Err(_) => {
            tracing::debug!(?timeout, "global install probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(update: Option<&str>, is_global: bool, is_loading: bool) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            update_available: update.map(str::to_string),
            current_version: "1.0.0".into(),
            is_global,
            is_loading,
            check_state: CheckState::Resolved,
        }
    }

    #[test]
    fn loading_snapshot_has_no_notice() {
        assert_eq!(snapshot(Some("2.0.0"), false, true).notice(), None);
    }

    #[test]
    fn update_notice_carries_install_mode() {
        assert_eq!(
            snapshot(Some("2.0.0"), true, false).notice(),
            Some(Notice::UpdateAvailable {
                current: "1.0.0".into(),
                latest: "2.0.0".into(),
                is_global: true,
            })
        );
    }

    #[test]
    fn local_install_gets_tip() {
        assert_eq!(snapshot(None, false, false).notice(), Some(Notice::InstallGlobally));
        assert_eq!(snapshot(None, true, false).notice(), None);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(snapshot(None, true, false))
            .expect("EnvironmentSnapshot serialization should succeed");
        assert_eq!(json["isGlobal"], true);
        assert_eq!(json["checkState"], "resolved");
        assert!(json["updateAvailable"].is_null());
    }
}
