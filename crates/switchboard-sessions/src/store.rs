use crate::types::{SessionEntry, SessionKey};

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store locked: {0}")]
    Locked(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl SessionStoreError {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

pub type SessionMutation = Box<dyn FnOnce(&mut SessionEntry) + Send>;

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_key: &str) -> SessionStoreResult<Option<SessionEntry>>;

    /// Applies `mutate` to an existing entry and returns the updated copy.
    /// Missing keys are left alone and yield `Ok(None)`.
    async fn update(
        &self,
        session_key: &str,
        mutate: SessionMutation,
    ) -> SessionStoreResult<Option<SessionEntry>>;

    async fn upsert(&self, session_key: &str, entry: SessionEntry) -> SessionStoreResult<()>;

    async fn list(&self) -> SessionStoreResult<Vec<(SessionKey, SessionEntry)>>;
}

pub(crate) fn validate_key(session_key: &str) -> SessionStoreResult<&str> {
    let trimmed = session_key.trim();
    if trimmed.is_empty() {
        return Err(SessionStoreError::InvalidInput(
            "session key must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
