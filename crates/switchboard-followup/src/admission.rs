use crate::queue::QueueRecord;
use crate::{DropPolicy, FollowupItem};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued { depth: usize, evicted: usize },
    /// `drop-newest` discarded the incoming item because the queue was full.
    Rejected { depth: usize },
    /// An item with the same message id is already queued.
    Duplicate { depth: usize },
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}

impl QueueRecord {
    pub(crate) fn admit(&mut self, session_key: &str, item: FollowupItem) -> EnqueueOutcome {
        if self.is_duplicate(&item) {
            tracing::debug!(session_key, message_id = ?item.message_id, "duplicate follow-up ignored");
            return EnqueueOutcome::Duplicate {
                depth: self.items.len(),
            };
        }

        self.last_enqueued_at = Instant::now();
        self.last_run = item.run.clone();
        self.last_route = item.route.clone();
        self.items.push_back(item);

        let Some(cap) = self.settings.cap_limit() else {
            return EnqueueOutcome::Queued {
                depth: self.items.len(),
                evicted: 0,
            };
        };
        if self.items.len() <= cap {
            return EnqueueOutcome::Queued {
                depth: self.items.len(),
                evicted: 0,
            };
        }

        match self.settings.drop_policy {
            DropPolicy::DropNewest => {
                let dropped = self.items.len() - cap;
                self.items.truncate(cap);
                tracing::info!(session_key, dropped, cap, "follow-up queue full; dropped newest");
                EnqueueOutcome::Rejected {
                    depth: self.items.len(),
                }
            }
            DropPolicy::DropOldest => {
                let evicted = self.evict_head_to(cap);
                tracing::info!(session_key, evicted, cap, "follow-up queue full; dropped oldest");
                EnqueueOutcome::Queued {
                    depth: self.items.len(),
                    evicted,
                }
            }
            DropPolicy::Summarize => {
                let evicted = self.evict_head_to(cap);
                tracing::info!(
                    session_key,
                    evicted,
                    cap,
                    pending_summary = self.summary.dropped_count,
                    "follow-up queue full; oldest folded into drop summary"
                );
                EnqueueOutcome::Queued {
                    depth: self.items.len(),
                    evicted,
                }
            }
        }
    }

    /// Removes items from the head until at most `cap` remain. Under `summarize`, each
    /// evicted item is folded into the pending drop summary.
    pub(crate) fn evict_head_to(&mut self, cap: usize) -> usize {
        let excess = self.items.len().saturating_sub(cap);
        let summarize = self.settings.drop_policy == DropPolicy::Summarize;
        let line_limit = self.settings.cap_limit();
        for evicted in self.items.drain(..excess) {
            if summarize {
                self.summary.record(&evicted, line_limit);
            }
        }
        excess
    }

    fn is_duplicate(&self, item: &FollowupItem) -> bool {
        let Some(message_id) = item.message_id.as_deref().filter(|id| !id.is_empty()) else {
            return false;
        };
        self.items
            .iter()
            .any(|queued| queued.message_id.as_deref() == Some(message_id))
    }
}
