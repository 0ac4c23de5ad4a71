use crate::summary::DropSummary;
use crate::{
    DrainConfig, EnqueueOutcome, FollowupError, FollowupItem, QueueMode, QueueSettings,
    RunContext,
};
use crate::item::OriginRoute;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

pub(crate) struct QueueRecord {
    pub(crate) items: VecDeque<FollowupItem>,
    pub(crate) settings: QueueSettings,
    pub(crate) summary: DropSummary,
    pub(crate) draining: bool,
    pub(crate) lock_retry_count: u32,
    pub(crate) last_run: RunContext,
    pub(crate) last_route: OriginRoute,
    pub(crate) last_enqueued_at: Instant,
    /// Bumped by `clear` so work taken before the clear is not restored after it.
    pub(crate) generation: u64,
}

impl QueueRecord {
    fn new(settings: QueueSettings, first: &FollowupItem) -> Self {
        Self {
            items: VecDeque::new(),
            settings,
            summary: DropSummary::default(),
            draining: false,
            lock_retry_count: 0,
            last_run: first.run.clone(),
            last_route: first.route.clone(),
            last_enqueued_at: Instant::now(),
            generation: 0,
        }
    }

    pub(crate) fn is_drained(&self) -> bool {
        self.items.is_empty() && self.summary.is_empty()
    }
}

/// Read-only view of one session's queue for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueSnapshot {
    pub mode: QueueMode,
    pub items: Vec<FollowupItem>,
    pub dropped_count: usize,
    pub summary_lines: Vec<String>,
    pub draining: bool,
    pub lock_retry_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClearedQueues {
    pub cleared: usize,
    pub keys: Vec<String>,
}

/// Owned registry of per-session follow-up queues.
///
/// Cloning shares the same underlying map. Every read-modify-write of a record happens
/// under one mutex that is never held across an `.await`.
#[derive(Clone, Default)]
pub struct FollowupQueues {
    pub(crate) inner: Arc<Mutex<HashMap<String, QueueRecord>>>,
    pub(crate) config: DrainConfig,
}

impl FollowupQueues {
    pub fn new(config: DrainConfig) -> Self {
        Self {
            inner: Arc::default(),
            config,
        }
    }

    pub fn config(&self) -> &DrainConfig {
        &self.config
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, QueueRecord>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits `item` into the session's queue, creating the queue on first use.
    ///
    /// Settings only take effect when the queue record is created; a live queue keeps
    /// the settings it was created with until it drains and is deleted.
    pub fn enqueue(
        &self,
        session_key: &str,
        item: FollowupItem,
        settings: &QueueSettings,
    ) -> Result<EnqueueOutcome, FollowupError> {
        let key = normalize_key(session_key)?;
        settings.validate()?;
        let mut queues = self.lock();
        let record = queues
            .entry(key.to_string())
            .or_insert_with(|| QueueRecord::new(settings.clone(), &item));
        Ok(record.admit(key, item))
    }

    pub fn depth(&self, session_key: &str) -> usize {
        self.lock()
            .get(session_key.trim())
            .map(|record| record.items.len())
            .unwrap_or_default()
    }

    /// True while a record exists for the key (queued work or a live drain pass).
    pub fn is_active(&self, session_key: &str) -> bool {
        self.lock().contains_key(session_key.trim())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn snapshot(&self, session_key: &str) -> Option<QueueSnapshot> {
        self.lock()
            .get(session_key.trim())
            .map(|record| QueueSnapshot {
                mode: record.settings.mode,
                items: record.items.iter().cloned().collect(),
                dropped_count: record.summary.dropped_count,
                summary_lines: record.summary.lines.clone(),
                draining: record.draining,
                lock_retry_count: record.lock_retry_count,
            })
    }

    /// Drops all queued work for one session and returns how many items were removed.
    ///
    /// A record owned by a drain pass is emptied in place; the pass deletes it when it
    /// next checks the queue, so a second pass can never start alongside it.
    pub fn clear(&self, session_key: &str) -> usize {
        let key = session_key.trim();
        let mut queues = self.lock();
        let Some(record) = queues.get_mut(key) else {
            return 0;
        };
        let removed = record.items.len();
        if record.draining {
            record.items.clear();
            record.summary = DropSummary::default();
            record.generation += 1;
        } else {
            queues.remove(key);
        }
        if removed > 0 {
            tracing::info!(session_key = %key, removed, "cleared follow-up queue");
        }
        removed
    }

    pub fn clear_many<I, S>(&self, session_keys: I) -> ClearedQueues
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = ClearedQueues::default();
        for key in session_keys {
            let key = key.as_ref().trim();
            if key.is_empty() || result.keys.iter().any(|seen| seen == key) {
                continue;
            }
            result.cleared += self.clear(key);
            result.keys.push(key.to_string());
        }
        result
    }
}

pub(crate) fn normalize_key(session_key: &str) -> Result<&str, FollowupError> {
    let key = session_key.trim();
    if key.is_empty() {
        return Err(FollowupError::InvalidSessionKey(session_key.to_string()));
    }
    Ok(key)
}
