use crate::types::SubagentRun;
use std::sync::{Arc, Mutex};

/// Read side of the subagent registry. The cascade only ever lists runs.
pub trait SubagentRegistry: Send + Sync {
    fn list_runs_for_requester(&self, requester_session_key: &str) -> Vec<SubagentRun>;
}

#[derive(Clone, Debug, Default)]
pub struct MemorySubagentRegistry {
    runs: Arc<Mutex<Vec<SubagentRun>>>,
}

impl MemorySubagentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, run: SubagentRun) {
        let mut runs = self.runs.lock().unwrap_or_else(|poison| poison.into_inner());
        runs.retain(|existing| existing.run_id != run.run_id);
        runs.push(run);
    }

    pub fn mark_ended(&self, run_id: &str, ended_at_ms: u64) -> bool {
        let mut runs = self.runs.lock().unwrap_or_else(|poison| poison.into_inner());
        match runs.iter_mut().find(|run| run.run_id == run_id) {
            Some(run) => {
                run.ended_at_ms = Some(ended_at_ms);
                true
            }
            None => false,
        }
    }
}

impl SubagentRegistry for MemorySubagentRegistry {
    fn list_runs_for_requester(&self, requester_session_key: &str) -> Vec<SubagentRun> {
        let requester = requester_session_key.trim();
        if requester.is_empty() {
            return Vec::new();
        }
        let runs = self.runs.lock().unwrap_or_else(|poison| poison.into_inner());
        runs.iter()
            .filter(|run| run.requester_session_key.eq_ignore_ascii_case(requester))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(run_id: &str, requester: &str, child: &str) -> SubagentRun {
        SubagentRun {
            run_id: run_id.to_string(),
            requester_session_key: requester.to_string(),
            child_session_key: child.to_string(),
            created_at_ms: 1,
            ended_at_ms: None,
        }
    }

    #[test]
    fn list_runs_for_requester_expected_only_matching_requester() {
        let registry = MemorySubagentRegistry::new();
        registry.register(run("r1", "agent:main:main", "agent:main:subagent:a"));
        registry.register(run("r2", "agent:other:main", "agent:other:subagent:b"));

        let runs = registry.list_runs_for_requester("Agent:Main:Main");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].child_session_key, "agent:main:subagent:a");
    }

    #[test]
    fn mark_ended_expected_run_no_longer_live() {
        let registry = MemorySubagentRegistry::new();
        registry.register(run("r1", "agent:main:main", "agent:main:subagent:a"));

        assert!(registry.mark_ended("r1", 50));
        assert!(!registry.mark_ended("missing", 50));
        let runs = registry.list_runs_for_requester("agent:main:main");
        assert!(!runs[0].is_live());
    }
}
