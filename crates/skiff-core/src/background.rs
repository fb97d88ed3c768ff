//! Fire-and-forget boundary.
//!
//! Cache writes and audit appends are observability, not correctness. They
//! run as detached tasks whose errors are logged here and go nowhere else.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Spawn `fut` detached; an error is logged at debug level and dropped.
///
/// Returns `None` (and skips the work) when called outside a Tokio runtime.
/// The handle only matters to callers that want to wait, such as tests.
pub fn spawn_best_effort<F>(label: &'static str, fut: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let Ok(handle) = Handle::try_current() else {
        tracing::debug!(task = label, "no runtime; skipping best-effort task");
        return None;
    };
    Some(handle.spawn(async move {
        if let Err(err) = fut.await {
            tracing::debug!(task = label, error = %format!("{err:#}"), "best-effort task failed");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_are_swallowed() {
        let handle = spawn_best_effort("test", async { anyhow::bail!("boom") })
            .expect("runtime should be available");
        handle.await.expect("task should not panic");
    }

    #[test]
    fn outside_runtime_is_a_noop() {
        assert!(spawn_best_effort("test", async { Ok(()) }).is_none());
    }
}
