use crate::{AbortIntents, ControlConfig, ControlError, ControlMatcher, RunAborter};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use switchboard_followup::FollowupQueues;
use switchboard_sessions::{SessionStore, SubagentRegistry, agent_prefix, now_ms};

/// Sessions touched by one cascade.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Sessions where queued work was cleared or a live run was aborted.
    pub stopped: usize,
    /// Every session the cascade visited, stopped or not.
    pub keys: Vec<String>,
}

/// Stop and abort surface over the follow-up queues and the session store.
#[derive(Clone)]
pub struct ControlPlane {
    pub(crate) queues: FollowupQueues,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) registry: Arc<dyn SubagentRegistry>,
    pub(crate) aborter: Arc<dyn RunAborter>,
    pub(crate) intents: AbortIntents,
    pub(crate) matcher: ControlMatcher,
    pub(crate) config: ControlConfig,
}

impl ControlPlane {
    pub fn new(
        queues: FollowupQueues,
        store: Arc<dyn SessionStore>,
        registry: Arc<dyn SubagentRegistry>,
        aborter: Arc<dyn RunAborter>,
        config: ControlConfig,
    ) -> Result<Self, ControlError> {
        let matcher = ControlMatcher::new(&config)?;
        Ok(Self {
            queues,
            store,
            registry,
            aborter,
            intents: AbortIntents::new(),
            matcher,
            config,
        })
    }

    pub fn queues(&self) -> &FollowupQueues {
        &self.queues
    }

    pub fn intents(&self) -> &AbortIntents {
        &self.intents
    }

    pub fn matcher(&self) -> &ControlMatcher {
        &self.matcher
    }

    /// Stops every live subagent spawned by `requester_key`, and theirs in turn.
    ///
    /// Each child is visited once even when several runs point at it.
    pub async fn stop_subagents(&self, requester_key: &str) -> StopReport {
        let requester = requester_key.trim();
        let mut report = StopReport::default();
        let mut visited = HashSet::from([requester.to_ascii_lowercase()]);
        let mut pending = VecDeque::from([requester.to_string()]);

        while let Some(parent) = pending.pop_front() {
            for run in self.registry.list_runs_for_requester(&parent) {
                if !run.is_live() {
                    continue;
                }
                let child = run.child_session_key.trim().to_string();
                if child.is_empty() || !visited.insert(child.to_ascii_lowercase()) {
                    continue;
                }
                if self.stop_session(&child).await {
                    report.stopped += 1;
                }
                report.keys.push(child.clone());
                pending.push_back(child);
            }
        }

        if !report.keys.is_empty() {
            tracing::info!(
                session_key = requester,
                stopped = report.stopped,
                visited = report.keys.len(),
                "subagent cascade finished"
            );
        }
        report
    }

    pub async fn stop_all_agent_sessions(
        &self,
        current_key: &str,
    ) -> Result<StopReport, ControlError> {
        self.stop_all_agent_sessions_at(current_key, now_ms()).await
    }

    /// Stops sessions sharing `current_key`'s agent prefix that were updated within the
    /// idle window ending at `now_ms`. The current session itself is never touched.
    pub async fn stop_all_agent_sessions_at(
        &self,
        current_key: &str,
        now_ms: u64,
    ) -> Result<StopReport, ControlError> {
        self.stop_agent_sessions(current_key, now_ms, &[]).await
    }

    pub(crate) async fn stop_agent_sessions(
        &self,
        current_key: &str,
        now_ms: u64,
        already_visited: &[String],
    ) -> Result<StopReport, ControlError> {
        let mut report = StopReport::default();
        let Some(prefix) = agent_prefix(current_key) else {
            return Ok(report);
        };
        let current = current_key.trim().to_ascii_lowercase();
        let cutoff = now_ms.saturating_sub(self.config.idle_window_ms);

        for (key, entry) in self.store.list().await? {
            let lowered = key.trim().to_ascii_lowercase();
            if lowered == current
                || agent_prefix(&key).as_deref() != Some(prefix.as_str())
                || entry.updated_at_ms < cutoff
                || already_visited
                    .iter()
                    .any(|seen| seen.eq_ignore_ascii_case(key.trim()))
            {
                continue;
            }
            if self.stop_session(&key).await {
                report.stopped += 1;
            }
            report.keys.push(key);
        }

        tracing::info!(
            session_key = %current_key.trim(),
            agent = %prefix,
            stopped = report.stopped,
            "agent-wide stop finished"
        );
        Ok(report)
    }

    /// Clears the session's queue and aborts its live run, if any.
    async fn stop_session(&self, session_key: &str) -> bool {
        let cleared = self.queues.clear(session_key);
        let aborted = match self.store.get(session_key).await {
            Ok(Some(entry)) => self.aborter.abort(&entry.session_id),
            Ok(None) => false,
            Err(error) => {
                tracing::warn!(session_key, %error, "session lookup failed while stopping");
                false
            }
        };
        cleared > 0 || aborted
    }
}
