//! Stop and abort cascade for the switchboard gateway.
//!
//! [`ControlPlane::handle_inbound_control_message`] recognizes stop commands, aborts the
//! target session once, and cascades to the subagents it spawned or, for stop-all, to
//! every recently active session of the same agent.

pub mod active;
pub mod config;
pub mod detect;
pub mod errors;
pub mod handler;
pub mod intents;
pub mod plane;

pub use active::{ActiveRuns, RunAbortHandle, RunAborter};
pub use config::{ControlConfig, DEFAULT_IDLE_WINDOW_MS};
pub use detect::{ControlIntent, ControlMatcher, detect_abort, detect_stop_all};
pub use errors::ControlError;
pub use handler::{ControlMessage, ControlOutcome};
pub use intents::AbortIntents;
pub use plane::{ControlPlane, StopReport};
