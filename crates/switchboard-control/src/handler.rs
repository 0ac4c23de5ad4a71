use crate::{ControlError, ControlIntent, ControlPlane};
use switchboard_sessions::{SessionEntry, now_ms};

/// An inbound chat message as seen by the control surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlMessage {
    pub body: String,
    pub session_key: String,
    /// Explicit target; falls back to `session_key` when unset.
    pub target_session_key: Option<String>,
    /// Whether the sender may issue commands on this surface.
    pub sender_authorized: bool,
}

impl ControlMessage {
    pub fn new(session_key: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            session_key: session_key.into(),
            target_session_key: None,
            sender_authorized: true,
        }
    }

    pub fn with_target(mut self, target_session_key: impl Into<String>) -> Self {
        self.target_session_key = Some(target_session_key.into());
        self
    }

    pub fn unauthorized(mut self) -> Self {
        self.sender_authorized = false;
        self
    }

    fn target(&self) -> &str {
        self.target_session_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| self.session_key.trim())
    }
}

/// `handled == false` means the message is not a control message and should be
/// processed normally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlOutcome {
    pub handled: bool,
    pub aborted: bool,
    pub stopped_subagents: usize,
}

impl ControlPlane {
    pub async fn handle_inbound_control_message(
        &self,
        message: &ControlMessage,
    ) -> Result<ControlOutcome, ControlError> {
        self.handle_inbound_control_message_at(message, now_ms()).await
    }

    pub async fn handle_inbound_control_message_at(
        &self,
        message: &ControlMessage,
        now_ms: u64,
    ) -> Result<ControlOutcome, ControlError> {
        let Some(intent) = self.matcher.classify(&message.body) else {
            return Ok(ControlOutcome::default());
        };
        if !message.sender_authorized {
            tracing::debug!(
                session_key = %message.session_key,
                "control message from unauthorized sender ignored"
            );
            return Ok(ControlOutcome::default());
        }
        let target = message.target().to_string();
        if target.is_empty() {
            return Err(ControlError::InvalidSessionKey(message.session_key.clone()));
        }

        let aborted = self.abort_target(&target, now_ms).await?;
        let subagents = self.stop_subagents(&target).await;
        let mut stopped = subagents.stopped;
        if intent == ControlIntent::StopAll {
            let agent_wide = self
                .stop_agent_sessions(&target, now_ms, &subagents.keys)
                .await?;
            stopped += agent_wide.stopped;
        }

        tracing::info!(
            session_key = %target,
            intent = ?intent,
            aborted,
            stopped,
            "control message handled"
        );
        Ok(ControlOutcome {
            handled: true,
            aborted,
            stopped_subagents: stopped,
        })
    }

    /// Aborts the target session once. A record already flagged `aborted_last_run` is
    /// left alone; a missing record leaves a pending intent instead.
    async fn abort_target(&self, session_key: &str, now_ms: u64) -> Result<bool, ControlError> {
        let Some(entry) = self.store.get(session_key).await? else {
            self.queues.clear(session_key);
            let recorded = self.intents.record(session_key, now_ms);
            if recorded {
                tracing::info!(session_key, "no session record yet; abort intent recorded");
            }
            return Ok(recorded);
        };
        if entry.aborted_last_run {
            tracing::debug!(session_key, "session already aborted");
            return Ok(false);
        }

        self.aborter.abort(&entry.session_id);
        self.queues.clear(session_key);
        self.mark_aborted(session_key, now_ms).await?;
        Ok(true)
    }

    /// Applies an intent recorded before the session's record existed.
    ///
    /// Returns `true` when an intent was pending and the record now carries the abort.
    /// The intent stays pending while the record is still missing.
    pub async fn honor_pending_abort(&self, session_key: &str) -> Result<bool, ControlError> {
        if !self.intents.contains(session_key) {
            return Ok(false);
        }
        let Some(entry) = self.store.get(session_key).await? else {
            return Ok(false);
        };
        self.intents.take(session_key);
        self.aborter.abort(&entry.session_id);
        self.queues.clear(session_key);
        self.mark_aborted(session_key, now_ms()).await?;
        tracing::info!(session_key, "pending abort intent honored");
        Ok(true)
    }

    /// Reports whether the previous run was aborted and resets the flag, so the next
    /// run starts clean and a later stop aborts it again.
    pub async fn take_abort_flag(&self, session_key: &str) -> Result<bool, ControlError> {
        let Some(entry) = self.store.get(session_key).await? else {
            return Ok(false);
        };
        if !entry.aborted_last_run {
            return Ok(false);
        }
        self.store
            .update(
                session_key,
                Box::new(|entry: &mut SessionEntry| entry.aborted_last_run = false),
            )
            .await?;
        Ok(true)
    }

    async fn mark_aborted(&self, session_key: &str, now_ms: u64) -> Result<(), ControlError> {
        self.store
            .update(
                session_key,
                Box::new(move |entry: &mut SessionEntry| {
                    entry.aborted_last_run = true;
                    entry.updated_at_ms = now_ms;
                }),
            )
            .await?;
        Ok(())
    }
}
