use crate::queue::QueueRecord;
use crate::select::DeliveryUnit;
use crate::{FollowupQueues, FollowupRunner, FollowupTurn, RunError, RunErrorKind};
use tokio::time::Instant;

impl QueueRecord {
    /// Hands work from a lock-contended attempt back to the queue.
    ///
    /// Restored work goes ahead of anything enqueued meanwhile. The cap is then
    /// re-applied by evicting from the head whatever the configured drop policy, so a
    /// restore never trims the newest arrivals.
    pub(crate) fn restore(&mut self, unit: DeliveryUnit) {
        let line_limit = self.settings.cap_limit();
        match unit {
            DeliveryUnit::Single(item) => self.items.push_front(item),
            DeliveryUnit::Collected { items, summary } => {
                for item in items.into_iter().rev() {
                    self.items.push_front(item);
                }
                self.summary.merge_earlier(summary, line_limit);
            }
            DeliveryUnit::Summary(summary) => self.summary.merge_earlier(summary, line_limit),
        }
        if let Some(cap) = line_limit {
            self.evict_head_to(cap);
        }
    }
}

impl FollowupQueues {
    /// Delivers one unit, retrying lock contention through the queue itself.
    ///
    /// Lock failures restore the unit and sleep the fixed retry delay; after
    /// `max_lock_retries` consecutive failures the unit is discarded. Any other
    /// failure is returned to the drain loop untouched. The retry count is reset
    /// whenever a unit leaves this loop, so each unit gets the full budget.
    pub(crate) async fn attempt_delivery(
        &self,
        session_key: &str,
        runner: &dyn FollowupRunner,
        turn: FollowupTurn,
        unit: DeliveryUnit,
        generation: u64,
    ) -> Result<(), RunError> {
        let error = match runner.run(turn).await {
            Err(error) if error.kind() == RunErrorKind::Locked => error,
            outcome => {
                // The unit is done with the controller; the next one starts from zero.
                self.reset_lock_retries(session_key);
                return outcome;
            }
        };

        let should_wait = {
            let mut queues = self.lock();
            let Some(record) = queues.get_mut(session_key) else {
                return Ok(());
            };
            if record.lock_retry_count >= self.config.max_lock_retries {
                tracing::error!(
                    session_key,
                    attempts = record.lock_retry_count + 1,
                    %error,
                    "session state still locked; discarding follow-up"
                );
                record.lock_retry_count = 0;
                false
            } else {
                record.lock_retry_count += 1;
                if record.generation == generation {
                    record.restore(unit);
                } else {
                    tracing::debug!(session_key, "queue cleared during attempt; not restoring");
                }
                record.last_enqueued_at = Instant::now();
                tracing::warn!(
                    session_key,
                    retry = record.lock_retry_count,
                    delay_ms = self.config.lock_retry_delay_ms,
                    %error,
                    "session state locked; retrying follow-up"
                );
                true
            }
        };

        if should_wait {
            tokio::time::sleep(self.config.lock_retry_delay()).await;
        }
        Ok(())
    }

    fn reset_lock_retries(&self, session_key: &str) {
        if let Some(record) = self.lock().get_mut(session_key) {
            record.lock_retry_count = 0;
        }
    }
}
