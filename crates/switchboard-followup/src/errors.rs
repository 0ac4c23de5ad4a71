use thiserror::Error;

/// Substrings engines use when the durable session state is held by another writer.
const LOCK_MARKERS: &[&str] = &[
    "session file locked",
    "session store locked",
    "session state locked",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunErrorKind {
    /// Another writer holds the session's durable state; retried with a fixed delay.
    Locked,
    Failed,
}

/// Failure reported by the execution engine for one follow-up turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("session state locked: {0}")]
    Locked(String),
    #[error("run failed: {0}")]
    Failed(String),
}

impl RunError {
    pub fn kind(&self) -> RunErrorKind {
        match self {
            Self::Locked(_) => RunErrorKind::Locked,
            Self::Failed(_) => RunErrorKind::Failed,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.kind() == RunErrorKind::Locked
    }

    /// Builds a typed error from engines that only surface message text.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();
        if LOCK_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            Self::Locked(message)
        } else {
            Self::Failed(message)
        }
    }
}

/// Top-level error type for the switchboard-followup crate.
#[derive(Debug, Error)]
pub enum FollowupError {
    #[error("invalid queue settings: {0}")]
    InvalidSettings(String),
    #[error("invalid session key: {0:?}")]
    InvalidSessionKey(String),
}
