use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub type SessionKey = String;

/// The slice of a durable session record the gateway core reads and writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_id: String,
    #[serde(default)]
    pub aborted_last_run: bool,
    pub updated_at_ms: u64,
}

impl SessionEntry {
    pub fn new(session_id: impl Into<String>, updated_at_ms: u64) -> Self {
        Self {
            session_id: session_id.into(),
            aborted_last_run: false,
            updated_at_ms,
        }
    }

    pub fn with_generated_id(updated_at_ms: u64) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), updated_at_ms)
    }
}

/// One spawn of a child session, as recorded by the external subagent registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubagentRun {
    pub run_id: String,
    pub requester_session_key: SessionKey,
    pub child_session_key: SessionKey,
    pub created_at_ms: u64,
    pub ended_at_ms: Option<u64>,
}

impl SubagentRun {
    pub fn is_live(&self) -> bool {
        self.ended_at_ms.is_none()
    }
}

/// Returns the lowercased two-segment agent prefix of a session key
/// (`agent:main:discord:123` -> `agent:main`).
pub fn agent_prefix(session_key: &str) -> Option<String> {
    let mut parts = session_key.trim().split(':');
    let scope = parts.next().filter(|part| !part.is_empty())?;
    let agent = parts.next().filter(|part| !part.is_empty())?;
    Some(format!("{scope}:{agent}").to_ascii_lowercase())
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
