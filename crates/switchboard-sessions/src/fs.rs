use crate::memory::MemoryState;
use crate::store::{
    SessionMutation, SessionStore, SessionStoreError, SessionStoreResult, validate_key,
};
use crate::types::{SessionEntry, SessionKey};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const STATE_FILE_NAME: &str = "sessions.json";
const LOCK_FILE_NAME: &str = "sessions.json.lock";

/// JSON-file session store shared between gateway processes.
///
/// The state file is the only copy: reads load it fresh, and writes reload it under an
/// advisory lock file, apply the change and replace it atomically. When another writer
/// holds the lock, writes fail with [`SessionStoreError::Locked`] instead of waiting;
/// the follow-up scheduler treats that as transient contention and retries.
#[derive(Clone, Debug)]
pub struct FsSessionStore {
    state_file: PathBuf,
    lock_file: PathBuf,
}

impl FsSessionStore {
    pub fn new<P: AsRef<Path>>(root: P) -> SessionStoreResult<Self> {
        fs::create_dir_all(root.as_ref()).map_err(|err| {
            SessionStoreError::Backend(format!("create session store root failed: {err}"))
        })?;
        let store = Self {
            state_file: root.as_ref().join(STATE_FILE_NAME),
            lock_file: root.as_ref().join(LOCK_FILE_NAME),
        };
        // Surface a corrupt state file at startup rather than on the first write.
        store.load()?;
        Ok(store)
    }

    pub fn lock_file_path(&self) -> &Path {
        &self.lock_file
    }

    fn acquire_lock(&self) -> SessionStoreResult<WriteLock> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_file)
        {
            Ok(_) => Ok(WriteLock {
                path: self.lock_file.clone(),
            }),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(SessionStoreError::Locked(
                self.state_file.display().to_string(),
            )),
            Err(err) => Err(SessionStoreError::Backend(format!(
                "create lock file failed: {err}"
            ))),
        }
    }

    fn load(&self) -> SessionStoreResult<MemoryState> {
        let raw = match fs::read(&self.state_file) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(MemoryState::default()),
            Err(err) => {
                return Err(SessionStoreError::Backend(format!(
                    "read state file failed: {err}"
                )));
            }
        };
        serde_json::from_slice(&raw).map_err(|err| SessionStoreError::Serialization(err.to_string()))
    }

    /// Caller must hold the [`WriteLock`].
    fn persist(&self, state: &MemoryState) -> SessionStoreResult<()> {
        let raw = serde_json::to_vec_pretty(state)
            .map_err(|err| SessionStoreError::Serialization(err.to_string()))?;
        let tmp = self.state_file.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .map_err(|err| SessionStoreError::Backend(format!("write state file failed: {err}")))?;
        fs::rename(&tmp, &self.state_file).map_err(|err| {
            SessionStoreError::Backend(format!("rename state file failed: {err}"))
        })?;
        Ok(())
    }
}

struct WriteLock {
    path: PathBuf,
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), %err, "failed to release session store lock");
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for FsSessionStore {
    async fn get(&self, session_key: &str) -> SessionStoreResult<Option<SessionEntry>> {
        let key = validate_key(session_key)?;
        Ok(self.load()?.sessions.remove(key))
    }

    async fn update(
        &self,
        session_key: &str,
        mutate: SessionMutation,
    ) -> SessionStoreResult<Option<SessionEntry>> {
        let key = validate_key(session_key)?;
        let _lock = self.acquire_lock()?;
        let mut state = self.load()?;
        let updated = state.apply(key, mutate);
        if updated.is_some() {
            self.persist(&state)?;
        }
        Ok(updated)
    }

    async fn upsert(&self, session_key: &str, entry: SessionEntry) -> SessionStoreResult<()> {
        let key = validate_key(session_key)?;
        let _lock = self.acquire_lock()?;
        let mut state = self.load()?;
        state.sessions.insert(key.to_string(), entry);
        self.persist(&state)
    }

    async fn list(&self) -> SessionStoreResult<Vec<(SessionKey, SessionEntry)>> {
        Ok(self.load()?.entries())
    }
}
