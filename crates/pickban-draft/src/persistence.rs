//! Persistence hand-off.
//!
//! Sessions never wait on storage. Each session gets its own worker task
//! fed by an unbounded queue: writes land in order, and a failed write is
//! logged and dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use pickban_protocol::{ActionKind, ChampionId, PerSide, SessionId, Side};
use tokio::sync::{Mutex, mpsc};

/// Errors a [`DraftRepository`] may report.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("write failed: {0}")]
    Write(String),
}

/// One slot written by a lock-in, an expiry, or an accepted edit.
///
/// An accepted edit is recorded again under the phase that first filled
/// the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAction {
    pub phase: usize,
    pub side: Side,
    pub kind: ActionKind,
    pub champion_id: ChampionId,
    pub auto_selected: bool,
}

/// Final picks and bans of a completed draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftResult {
    pub picks: PerSide<Vec<ChampionId>>,
    pub bans: PerSide<Vec<ChampionId>>,
}

/// A write the state machine asks the session to hand off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistRequest {
    Action(RecordedAction),
    Completion(DraftResult),
}

/// Durable storage for draft results.
///
/// Implementations run on the session's persistence worker, so they may
/// take as long as they need.
pub trait DraftRepository: Send + Sync + 'static {
    fn record_action(
        &self,
        session: &SessionId,
        action: &RecordedAction,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn persist_completion(
        &self,
        session: &SessionId,
        result: &DraftResult,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

// ---------------------------------------------------------------------------
// Built-in repositories
// ---------------------------------------------------------------------------

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRepository;

impl DraftRepository for NoopRepository {
    async fn record_action(
        &self,
        _session: &SessionId,
        _action: &RecordedAction,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn persist_completion(
        &self,
        _session: &SessionId,
        _result: &DraftResult,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoredDraft {
    actions: Vec<RecordedAction>,
    result: Option<DraftResult>,
}

/// Keeps everything in memory. Used by tests and the demo server.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    drafts: Mutex<HashMap<SessionId, StoredDraft>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions recorded for `session`, oldest first.
    pub async fn actions(&self, session: &SessionId) -> Vec<RecordedAction> {
        self.drafts
            .lock()
            .await
            .get(session)
            .map(|d| d.actions.clone())
            .unwrap_or_default()
    }

    pub async fn result(&self, session: &SessionId) -> Option<DraftResult> {
        self.drafts
            .lock()
            .await
            .get(session)
            .and_then(|d| d.result.clone())
    }
}

impl DraftRepository for MemoryRepository {
    async fn record_action(
        &self,
        session: &SessionId,
        action: &RecordedAction,
    ) -> Result<(), PersistenceError> {
        self.drafts
            .lock()
            .await
            .entry(session.clone())
            .or_default()
            .actions
            .push(action.clone());
        Ok(())
    }

    async fn persist_completion(
        &self,
        session: &SessionId,
        result: &DraftResult,
    ) -> Result<(), PersistenceError> {
        self.drafts
            .lock()
            .await
            .entry(session.clone())
            .or_default()
            .result = Some(result.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Worker plumbing
// ---------------------------------------------------------------------------

type SpawnFn = dyn Fn(SessionId) -> PersistQueue + Send + Sync;

/// Starts one persistence worker per session against a shared repository.
#[derive(Clone)]
pub struct Persistence {
    spawn: Arc<SpawnFn>,
}

impl Persistence {
    pub fn new<R: DraftRepository>(repo: Arc<R>) -> Self {
        Self {
            spawn: Arc::new(move |session_id| {
                spawn_worker(session_id, Arc::clone(&repo))
            }),
        }
    }

    /// Persistence that stores nothing.
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopRepository))
    }

    pub(crate) fn start(&self, session_id: SessionId) -> PersistQueue {
        (self.spawn)(session_id)
    }
}

impl Default for Persistence {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}

/// Sending half of a session's persistence worker.
///
/// Dropping it lets the worker drain what is queued and exit.
#[derive(Debug)]
pub(crate) struct PersistQueue {
    session_id: SessionId,
    tx: mpsc::UnboundedSender<PersistRequest>,
}

impl PersistQueue {
    pub(crate) fn submit(&self, request: PersistRequest) {
        if self.tx.send(request).is_err() {
            tracing::warn!(
                session_id = %self.session_id,
                "persistence worker gone, dropping write"
            );
        }
    }
}

fn spawn_worker<R: DraftRepository>(
    session_id: SessionId,
    repo: Arc<R>,
) -> PersistQueue {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistRequest>();
    let worker_id = session_id.clone();

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let result = match &request {
                PersistRequest::Action(action) => {
                    repo.record_action(&worker_id, action).await
                }
                PersistRequest::Completion(result) => {
                    repo.persist_completion(&worker_id, result).await
                }
            };
            if let Err(e) = result {
                tracing::warn!(
                    session_id = %worker_id,
                    error = %e,
                    "persistence write failed"
                );
            }
        }
        tracing::debug!(session_id = %worker_id, "persistence worker stopped");
    });

    PersistQueue { session_id, tx }
}
