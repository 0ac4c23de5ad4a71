use switchboard_sessions::SessionStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("session store error: {0}")]
    Store(#[from] SessionStoreError),
    #[error("invalid control configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid session key: {0:?}")]
    InvalidSessionKey(String),
}

impl ControlError {
    /// True when the durable store reported another writer holding it.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_locked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_locked_error_expected_is_locked() {
        let error = ControlError::from(SessionStoreError::Locked("sessions.json".to_string()));
        assert!(error.is_locked());
        assert!(!ControlError::InvalidConfiguration("bad".to_string()).is_locked());
    }
}
