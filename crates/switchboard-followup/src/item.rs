use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Where a message came from, used to route the reply back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginRoute {
    pub channel: Option<String>,
    pub to: Option<String>,
    pub account_id: Option<String>,
    pub thread_id: Option<String>,
}

pub(crate) enum Destination {
    Unrouted,
    /// Some coordinates are present but not enough to address a reply.
    Incomplete,
    Keyed(String),
}

impl OriginRoute {
    pub fn new(channel: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            to: Some(to.into()),
            ..Self::default()
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn is_routable(&self) -> bool {
        [&self.channel, &self.to, &self.account_id, &self.thread_id]
            .into_iter()
            .any(|field| non_empty(field).is_some())
    }

    pub(crate) fn destination(&self) -> Destination {
        if !self.is_routable() {
            return Destination::Unrouted;
        }
        let (Some(channel), Some(to)) = (non_empty(&self.channel), non_empty(&self.to)) else {
            return Destination::Incomplete;
        };
        Destination::Keyed(format!(
            "{}|{}|{}|{}",
            channel.to_ascii_lowercase(),
            to,
            non_empty(&self.account_id).unwrap_or_default(),
            non_empty(&self.thread_id).unwrap_or_default()
        ))
    }

    /// Fills each missing coordinate from `other`.
    pub(crate) fn fill_from(&mut self, other: &OriginRoute) {
        fill(&mut self.channel, &other.channel);
        fill(&mut self.to, &other.to);
        fill(&mut self.account_id, &other.account_id);
        fill(&mut self.thread_id, &other.thread_id);
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn fill(target: &mut Option<String>, source: &Option<String>) {
    if non_empty(target).is_none() {
        if let Some(value) = non_empty(source) {
            *target = Some(value.to_string());
        }
    }
}

/// Execution context owned by the caller and handed back to the engine untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub session_id: String,
    pub session_key: String,
    pub agent_id: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl RunContext {
    pub fn new(session_id: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            session_key: session_key.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowupItem {
    pub prompt: String,
    /// Chat-surface message id; repeated ids for one session are admitted once.
    pub message_id: Option<String>,
    /// Short text used instead of the prompt when the item is summarized away.
    pub summary_line: Option<String>,
    pub enqueued_at_ms: u64,
    #[serde(default)]
    pub route: OriginRoute,
    pub run: RunContext,
}

impl FollowupItem {
    pub fn new(prompt: impl Into<String>, run: RunContext) -> Self {
        Self {
            prompt: prompt.into(),
            message_id: None,
            summary_line: None,
            enqueued_at_ms: now_ms(),
            route: OriginRoute::default(),
            run,
        }
    }

    pub fn with_route(mut self, route: OriginRoute) -> Self {
        self.route = route;
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_summary_line(mut self, summary_line: impl Into<String>) -> Self {
        self.summary_line = Some(summary_line.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnKind {
    Single,
    Collected { count: usize },
    DropSummary { dropped: usize },
}

/// One unit of work handed to the execution engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FollowupTurn {
    pub session_key: String,
    pub kind: TurnKind,
    pub prompt: String,
    pub route: OriginRoute,
    pub run: RunContext,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
