use crate::FollowupError;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_CAP: usize = 20;
pub const MAX_DEBOUNCE_MS: u64 = 60_000;
pub const DEFAULT_LOCK_RETRY_DELAY_MS: u64 = 250;
pub const DEFAULT_MAX_LOCK_RETRIES: u32 = 3;

/// How a drain pass hands queued items to the execution engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueMode {
    Interrupt,
    #[default]
    Individual,
    Collect,
}

impl QueueMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::Individual => "individual",
            Self::Collect => "collect",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropPolicy {
    #[default]
    Summarize,
    DropOldest,
    DropNewest,
}

impl DropPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::DropOldest => "drop-oldest",
            Self::DropNewest => "drop-newest",
        }
    }
}

/// Per-queue admission settings, captured when a session's queue record is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub mode: QueueMode,
    pub debounce_ms: u64,
    /// Maximum retained items; `0` disables capping.
    #[serde(deserialize_with = "deserialize_cap")]
    pub cap: usize,
    pub drop_policy: DropPolicy,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            mode: QueueMode::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            cap: DEFAULT_CAP,
            drop_policy: DropPolicy::default(),
        }
    }
}

impl QueueSettings {
    pub fn validate(&self) -> Result<(), FollowupError> {
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(FollowupError::InvalidSettings(format!(
                "debounce_ms {} exceeds maximum {}",
                self.debounce_ms, MAX_DEBOUNCE_MS
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cap_limit(&self) -> Option<usize> {
        (self.cap > 0).then_some(self.cap)
    }
}

/// Scheduler-wide knobs shared by every queue in one store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    pub lock_retry_delay_ms: u64,
    pub max_lock_retries: u32,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            lock_retry_delay_ms: DEFAULT_LOCK_RETRY_DELAY_MS,
            max_lock_retries: DEFAULT_MAX_LOCK_RETRIES,
        }
    }
}

impl DrainConfig {
    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_delay_ms)
    }
}

// Loosely typed configs express "no cap" as a negative number.
fn deserialize_cap<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(usize::try_from(raw.max(0)).unwrap_or(usize::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_settings_defaults_expected_baseline() {
        let settings = QueueSettings::default();
        assert_eq!(settings.mode, QueueMode::Individual);
        assert_eq!(settings.debounce_ms, 1_000);
        assert_eq!(settings.cap, 20);
        assert_eq!(settings.drop_policy, DropPolicy::Summarize);
        assert_eq!(DrainConfig::default().max_lock_retries, 3);
    }

    #[test]
    fn queue_settings_toml_kebab_case_expected_parsed() {
        let settings: QueueSettings = toml::from_str(
            r#"
            mode = "collect"
            debounce_ms = 0
            cap = -1
            drop_policy = "drop-newest"
            "#,
        )
        .expect("settings should parse");

        assert_eq!(settings.mode, QueueMode::Collect);
        assert_eq!(settings.cap, 0);
        assert_eq!(settings.cap_limit(), None);
        assert_eq!(settings.drop_policy, DropPolicy::DropNewest);
    }

    #[test]
    fn queue_settings_oversized_debounce_expected_invalid() {
        let settings = QueueSettings {
            debounce_ms: MAX_DEBOUNCE_MS + 1,
            ..QueueSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(FollowupError::InvalidSettings(_))
        ));
    }
}
