use crate::select::DrainPass;
use crate::{FollowupQueues, FollowupRunner, RunError};
use std::sync::Arc;
use tokio::time::Instant;

impl FollowupQueues {
    /// Starts a drain pass for `session_key` unless one already owns the queue.
    ///
    /// Returns `true` when a new pass was spawned. Calling this while a pass is live,
    /// or for a key with nothing queued, is a no-op. Must be called from within a
    /// tokio runtime.
    pub fn schedule_drain(&self, session_key: &str, runner: Arc<dyn FollowupRunner>) -> bool {
        let key = session_key.trim().to_string();
        {
            let mut queues = self.lock();
            let Some(record) = queues.get_mut(&key) else {
                return false;
            };
            if record.draining {
                return false;
            }
            record.draining = true;
        }

        tracing::debug!(session_key = %key, "follow-up drain scheduled");
        let queues = self.clone();
        tokio::spawn(async move {
            queues.run_drain(key, runner).await;
        });
        true
    }

    async fn run_drain(&self, session_key: String, runner: Arc<dyn FollowupRunner>) {
        loop {
            let error = match self.drain_pass(&session_key, runner.as_ref()).await {
                Ok(()) => return,
                Err(error) => error,
            };
            tracing::error!(
                session_key = %session_key,
                %error,
                "follow-up delivery failed; re-arming drain"
            );
            {
                let mut queues = self.lock();
                let Some(record) = queues.get_mut(&session_key) else {
                    return;
                };
                record.last_enqueued_at = Instant::now();
            }
            // A zero debounce would otherwise spin on an engine that keeps failing.
            tokio::time::sleep(self.config.lock_retry_delay()).await;
        }
    }

    /// One pass: keeps delivering until the record has no items and no pending
    /// summary, then deletes it. The `draining` flag stays set throughout.
    async fn drain_pass(
        &self,
        session_key: &str,
        runner: &dyn FollowupRunner,
    ) -> Result<(), RunError> {
        let mut pass = DrainPass::default();
        loop {
            self.wait_for_quiet(session_key).await;

            let (unit, turn, generation) = {
                let mut queues = self.lock();
                let Some(record) = queues.get_mut(session_key) else {
                    return Ok(());
                };
                let Some(unit) = record.take_next_unit(session_key, &mut pass) else {
                    queues.remove(session_key);
                    tracing::debug!(session_key, "follow-up queue drained");
                    return Ok(());
                };
                let turn = record.turn_for(session_key, &unit);
                (unit, turn, record.generation)
            };

            self.attempt_delivery(session_key, runner, turn, unit, generation)
                .await?;
        }
    }

    /// Sleeps until the queue has been quiet for its debounce window. Enqueues that
    /// land during the sleep push the deadline out.
    async fn wait_for_quiet(&self, session_key: &str) {
        loop {
            let deadline = {
                let queues = self.lock();
                let Some(record) = queues.get(session_key) else {
                    return;
                };
                record.last_enqueued_at + record.settings.debounce()
            };
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}
