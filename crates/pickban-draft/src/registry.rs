//! Session registry: creates, finds, and retires session actors by id.

use std::collections::HashMap;

use pickban_protocol::SessionId;

use crate::session::{SessionHandle, SessionInfo, spawn_session};
use crate::{DraftError, Persistence, SessionConfig};

/// All live sessions of one server.
///
/// Not synchronized itself; the server keeps it behind a
/// `tokio::sync::Mutex` and callers clone the handle they need instead of
/// holding the lock across session calls.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<SessionId, SessionHandle>,
    persistence: Persistence,
}

impl Registry {
    /// A registry whose sessions persist nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose sessions hand their writes to `persistence`.
    pub fn with_persistence(persistence: Persistence) -> Self {
        Self {
            sessions: HashMap::new(),
            persistence,
        }
    }

    /// Spawns a session under `id`.
    ///
    /// A retired session's id may be reused; a live one may not.
    pub fn create(
        &mut self,
        id: SessionId,
        config: SessionConfig,
    ) -> Result<SessionHandle, DraftError> {
        if self.sessions.get(&id).is_some_and(|h| !h.is_closed()) {
            return Err(DraftError::AlreadyExists(id));
        }
        let handle = spawn_session(id.clone(), config, &self.persistence)?;
        self.sessions.insert(id.clone(), handle.clone());
        tracing::info!(session_id = %id, "session created");
        Ok(handle)
    }

    /// The live session under `id`.
    pub fn get(&self, id: &SessionId) -> Result<SessionHandle, DraftError> {
        self.sessions
            .get(id)
            .filter(|h| !h.is_closed())
            .cloned()
            .ok_or_else(|| DraftError::SessionNotFound(id.clone()))
    }

    /// The live session under `id`, creating it with `config` if needed.
    ///
    /// Repeated calls for one id return handles to the same actor.
    pub fn get_or_create(
        &mut self,
        id: SessionId,
        config: SessionConfig,
    ) -> Result<SessionHandle, DraftError> {
        match self.get(&id) {
            Ok(handle) => Ok(handle),
            Err(_) => self.create(id, config),
        }
    }

    /// Shuts the session down and forgets it.
    pub async fn remove(&mut self, id: &SessionId) -> Result<(), DraftError> {
        let handle = self
            .sessions
            .remove(id)
            .ok_or_else(|| DraftError::SessionNotFound(id.clone()))?;
        // Already stopped is fine.
        let _ = handle.shutdown().await;
        tracing::info!(session_id = %id, "session removed");
        Ok(())
    }

    /// Forgets sessions whose actor has retired. Returns how many.
    pub fn reap(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|id, handle| {
            let live = !handle.is_closed();
            if !live {
                tracing::debug!(session_id = %id, "reaping retired session");
            }
            live
        });
        before - self.sessions.len()
    }

    /// Info for every session that answers.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let mut infos = Vec::with_capacity(self.sessions.len());
        for handle in self.sessions.values() {
            if let Ok(info) = handle.info().await {
                infos.push(info);
            }
        }
        infos
    }

    /// Cloned handles, for async work without holding the registry lock.
    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
