use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Aborts requested before the target session's durable record existed.
///
/// Process-lifetime only. Entries map a session key to the request time in
/// milliseconds and are consumed by [`crate::ControlPlane::honor_pending_abort`].
#[derive(Clone, Debug, Default)]
pub struct AbortIntents {
    inner: Arc<Mutex<HashMap<String, u64>>>,
}

impl AbortIntents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an intent for the key was already pending.
    pub fn record(&self, session_key: &str, requested_at_ms: u64) -> bool {
        let mut intents = self.lock();
        if intents.contains_key(session_key.trim()) {
            return false;
        }
        intents.insert(session_key.trim().to_string(), requested_at_ms);
        true
    }

    pub fn take(&self, session_key: &str) -> Option<u64> {
        self.lock().remove(session_key.trim())
    }

    pub fn contains(&self, session_key: &str) -> bool {
        self.lock().contains_key(session_key.trim())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
