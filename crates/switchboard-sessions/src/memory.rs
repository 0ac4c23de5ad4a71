use crate::store::{
    SessionMutation, SessionStore, SessionStoreError, SessionStoreResult, validate_key,
};
use crate::types::{SessionEntry, SessionKey};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct MemoryState {
    #[serde(default)]
    pub sessions: BTreeMap<SessionKey, SessionEntry>,
}

impl MemoryState {
    pub(crate) fn apply(&mut self, key: &str, mutate: SessionMutation) -> Option<SessionEntry> {
        let entry = self.sessions.get_mut(key)?;
        mutate(entry);
        Some(entry.clone())
    }

    pub(crate) fn entries(&self) -> Vec<(SessionKey, SessionEntry)> {
        self.sessions
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, SessionEntry)>,
        K: Into<SessionKey>,
    {
        let sessions = entries
            .into_iter()
            .map(|(key, entry)| (key.into(), entry))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(MemoryState { sessions })),
        }
    }

    fn lock(&self) -> SessionStoreResult<MutexGuard<'_, MemoryState>> {
        self.inner
            .lock()
            .map_err(|_| SessionStoreError::Backend("memory session store mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_key: &str) -> SessionStoreResult<Option<SessionEntry>> {
        let key = validate_key(session_key)?;
        Ok(self.lock()?.sessions.get(key).cloned())
    }

    async fn update(
        &self,
        session_key: &str,
        mutate: SessionMutation,
    ) -> SessionStoreResult<Option<SessionEntry>> {
        let key = validate_key(session_key)?;
        Ok(self.lock()?.apply(key, mutate))
    }

    async fn upsert(&self, session_key: &str, entry: SessionEntry) -> SessionStoreResult<()> {
        let key = validate_key(session_key)?;
        self.lock()?.sessions.insert(key.to_string(), entry);
        Ok(())
    }

    async fn list(&self) -> SessionStoreResult<Vec<(SessionKey, SessionEntry)>> {
        Ok(self.lock()?.entries())
    }
}
