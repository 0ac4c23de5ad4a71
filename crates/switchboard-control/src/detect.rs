use crate::{ControlConfig, ControlError};
use regex::{Regex, RegexBuilder};

const ABORT_TRIGGERS: &[&str] = &["stop", "abort", "wait", "exit", "interrupt", "esc"];

// Kept disjoint from the single-session vocabulary.
const STOP_ALL_TRIGGERS: &[&str] = &[
    "stop all",
    "abort all",
    "stop everything",
    "cancel all",
    "cancel everything",
];

/// `<@123>`, `<@!123>`, `<@&role>` and `@name`, with an optional trailing `,` or `:`.
const BUILTIN_MENTION: &str = r"(?:<@[!&]?[\w-]+>|@[\w.-]+)[,:]?";

const STOP_COMMAND: &str = "/stop";

/// Exact, case-insensitive match against the single-session abort words.
pub fn detect_abort(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    ABORT_TRIGGERS.contains(&normalized.as_str())
}

/// Exact match against the stop-all phrases. Inner whitespace runs count as one space.
pub fn detect_stop_all(text: &str) -> bool {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    STOP_ALL_TRIGGERS.contains(&normalized.as_str())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlIntent {
    /// Stop the target session and the subagents it spawned.
    Abort,
    /// Additionally stop every recently active session of the same agent.
    StopAll,
}

/// Recognizes control messages once channel envelopes and bot mentions are removed.
#[derive(Clone, Debug)]
pub struct ControlMatcher {
    mentions: Vec<Regex>,
    bot_username: Option<String>,
}

impl ControlMatcher {
    pub fn new(config: &ControlConfig) -> Result<Self, ControlError> {
        let mut mentions = vec![build_anchored(BUILTIN_MENTION)?];
        for pattern in &config.mention_patterns {
            mentions.push(build_anchored(pattern)?);
        }
        let bot_username = config
            .bot_username
            .as_deref()
            .map(|name| name.trim().trim_start_matches('@').to_lowercase())
            .filter(|name| !name.is_empty());
        Ok(Self {
            mentions,
            bot_username,
        })
    }

    pub fn classify(&self, body: &str) -> Option<ControlIntent> {
        let text = self.strip_prefixes(body);
        if let Some(intent) = self.parse_stop_command(text) {
            return Some(intent);
        }
        if detect_stop_all(text) {
            return Some(ControlIntent::StopAll);
        }
        detect_abort(text).then_some(ControlIntent::Abort)
    }

    /// Removes leading `[...]` envelopes and mentions, in any order and repetition.
    pub fn strip_prefixes<'a>(&self, text: &'a str) -> &'a str {
        let mut rest = text.trim();
        loop {
            if let Some(after) = strip_envelope(rest) {
                rest = after;
                continue;
            }
            match self.strip_mention(rest) {
                Some(after) => rest = after,
                None => return rest,
            }
        }
    }

    fn strip_mention<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.mentions.iter().find_map(|pattern| {
            pattern
                .find(text)
                .filter(|found| found.end() > 0)
                .map(|found| text[found.end()..].trim_start())
        })
    }

    /// `/stop` or `/stop@bot`, optionally followed by `all` or `everything`.
    fn parse_stop_command(&self, text: &str) -> Option<ControlIntent> {
        let mut words = text.split_whitespace();
        let command = words.next()?.to_lowercase();
        let (name, target) = match command.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (command.as_str(), None),
        };
        if name != STOP_COMMAND {
            return None;
        }
        if let (Some(target), Some(expected)) = (target, self.bot_username.as_deref()) {
            if target != expected {
                return None;
            }
        }

        match (words.next(), words.next()) {
            (None, _) => Some(ControlIntent::Abort),
            (Some(argument), None)
                if matches!(argument.to_lowercase().as_str(), "all" | "everything") =>
            {
                Some(ControlIntent::StopAll)
            }
            _ => None,
        }
    }
}

fn strip_envelope(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('[')?;
    let end = inner.find(']')?;
    Some(inner[end + 1..].trim_start())
}

fn build_anchored(pattern: &str) -> Result<Regex, ControlError> {
    RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()
        .map_err(|error| {
            ControlError::InvalidConfiguration(format!(
                "invalid mention pattern {pattern:?}: {error}"
            ))
        })
}
