use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use switchboard_control::ControlConfig;
use switchboard_followup::{DrainConfig, QueueSettings};

const DEFAULT_CONFIG_FILE: &str = "switchboard.toml";
const CONFIG_ENV_VAR: &str = "SWITCHBOARD_CONFIG";

/// Contents of `switchboard.toml`. Every section is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    pub queue: QueueConfig,
    pub drain: DrainConfig,
    pub control: ControlConfig,
}

/// `[queue]` holds the default settings; `[queue.by_channel.<name>]` replaces them for
/// one channel. Fields missing from a channel table take the built-in defaults.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    #[serde(flatten)]
    pub defaults: QueueSettings,
    pub by_channel: BTreeMap<String, QueueSettings>,
}

impl SwitchboardConfig {
    /// Resolves the config file from the flag, then `SWITCHBOARD_CONFIG`, then
    /// `./switchboard.toml` if present. No file means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .or_else(|| {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                fallback.exists().then_some(fallback)
            });
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed reading config '{}': {e}", path.display()))?;
        let config = Self::parse(&raw)
            .map_err(|e| format!("invalid config '{}': {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(raw).map_err(|e| e.to_string())?;
        config
            .queue
            .defaults
            .validate()
            .map_err(|e| e.to_string())?;
        for (channel, settings) in &config.queue.by_channel {
            settings
                .validate()
                .map_err(|e| format!("queue.by_channel.{channel}: {e}"))?;
        }
        Ok(config)
    }

    pub fn queue_settings_for(&self, channel: Option<&str>) -> &QueueSettings {
        channel
            .and_then(|channel| {
                self.queue
                    .by_channel
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(channel))
            })
            .map(|(_, settings)| settings)
            .unwrap_or(&self.queue.defaults)
    }
}
