use serde::{Deserialize, Serialize};

/// Sessions not touched within this window are left alone by stop-all.
pub const DEFAULT_IDLE_WINDOW_MS: u64 = 30 * 60 * 1_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub idle_window_ms: u64,
    /// Extra regexes matching a leading bot mention, e.g. `(?:hey\s+)?jarvis[,:]?`.
    /// Matched case-insensitively at the start of the message.
    pub mention_patterns: Vec<String>,
    /// Bot username accepted in `/stop@name`. Any suffix is accepted when unset.
    pub bot_username: Option<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            idle_window_ms: DEFAULT_IDLE_WINDOW_MS,
            mention_patterns: Vec::new(),
            bot_username: None,
        }
    }
}
