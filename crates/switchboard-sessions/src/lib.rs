//! Durable session records and the subagent registry read interface.
//!
//! The gateway core never owns conversation content; it only needs to look up a
//! session's execution id, flip the `aborted_last_run` flag, and see when a session
//! was last touched. Everything else about a session lives with the execution engine.

pub mod fs;
pub mod memory;
pub mod registry;
pub mod store;
pub mod types;

pub use fs::FsSessionStore;
pub use memory::MemorySessionStore;
pub use registry::{MemorySubagentRegistry, SubagentRegistry};
pub use store::{SessionMutation, SessionStore, SessionStoreError, SessionStoreResult};
pub use types::{SessionEntry, SessionKey, SubagentRun, agent_prefix, now_ms};
