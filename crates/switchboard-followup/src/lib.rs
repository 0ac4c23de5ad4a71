//! Per-session follow-up queues for messages that arrive while an agent is busy.
//!
//! Callers [`FollowupQueues::enqueue`] work and then wake the session with
//! [`FollowupQueues::schedule_drain`]. At most one drain pass owns a session's queue at
//! a time, so turns for one session never overlap while different sessions drain
//! independently.

pub mod admission;
pub mod config;
mod drain;
pub mod errors;
pub mod item;
pub mod queue;
mod retry;
pub mod runner;
mod select;
pub mod summary;

pub use admission::EnqueueOutcome;
pub use config::{
    DEFAULT_CAP, DEFAULT_DEBOUNCE_MS, DEFAULT_LOCK_RETRY_DELAY_MS, DEFAULT_MAX_LOCK_RETRIES,
    DrainConfig, DropPolicy, MAX_DEBOUNCE_MS, QueueMode, QueueSettings,
};
pub use errors::{FollowupError, RunError, RunErrorKind};
pub use item::{FollowupItem, FollowupTurn, OriginRoute, RunContext, TurnKind};
pub use queue::{ClearedQueues, FollowupQueues, QueueSnapshot};
pub use runner::FollowupRunner;
pub use summary::{DropSummary, SUMMARY_PREVIEW_CHARS, preview, render_collected, render_summary};
