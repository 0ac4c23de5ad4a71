use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Execution abort primitive. Best-effort: returns whether an in-flight run for the
/// session id was found and signaled.
pub trait RunAborter: Send + Sync {
    fn abort(&self, session_id: &str) -> bool;
}

/// Cooperative cancellation signal handed to a running turn.
#[derive(Clone, Debug, Default)]
pub struct RunAbortHandle {
    abort_requested: Arc<AtomicBool>,
    abort_notify: Arc<Notify>,
}

impl RunAbortHandle {
    pub fn request_abort(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
        self.abort_notify.notify_waiters();
    }

    pub fn is_abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    /// Resolves once an abort has been requested.
    pub async fn aborted(&self) {
        loop {
            let notified = self.abort_notify.notified();
            if self.is_abort_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// In-memory registry of runs currently executing, keyed by session id.
#[derive(Clone, Debug, Default)]
pub struct ActiveRuns {
    runs: Arc<Mutex<HashMap<String, RunAbortHandle>>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run and returns its abort handle. A previous run registered under
    /// the same id is replaced.
    pub fn register(&self, session_id: &str) -> RunAbortHandle {
        let handle = RunAbortHandle::default();
        self.lock().insert(session_id.to_string(), handle.clone());
        handle
    }

    pub fn finish(&self, session_id: &str) {
        self.lock().remove(session_id);
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RunAbortHandle>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunAborter for ActiveRuns {
    fn abort(&self, session_id: &str) -> bool {
        let Some(handle) = self.lock().remove(session_id) else {
            return false;
        };
        handle.request_abort();
        tracing::info!(session_id, "abort requested for active run");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(flavor = "current_thread")]
    async fn abort_registered_run_expected_handle_signaled() {
        let runs = ActiveRuns::new();
        let handle = runs.register("s-1");
        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.aborted().await }
        });

        assert!(runs.abort("s-1"));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter task should not panic");
        assert!(handle.is_abort_requested());
        assert!(!runs.is_active("s-1"));
    }

    #[test]
    fn abort_unknown_run_expected_false() {
        let runs = ActiveRuns::new();
        assert!(!runs.abort("missing"));
        runs.register("s-1");
        runs.finish("s-1");
        assert!(!runs.abort("s-1"));
    }
}
