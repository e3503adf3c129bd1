//! Error types for the draft layer.

use pickban_protocol::{ChampionId, SessionId, Side};

/// Why a draft operation was refused.
///
/// A refused command never mutates the session. The server reports it
/// only to the connection that sent it, as `error{code, message}` with
/// [`DraftError::code`] as the code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    /// The current phase belongs to the other side.
    #[error("not your turn: phase {phase} belongs to {side}")]
    NotYourTurn { phase: usize, side: Side },

    /// The sender is on a side but is not its captain.
    #[error("only the {0} captain may do that")]
    NotCaptain(Side),

    #[error("spectators cannot act")]
    Spectator,

    /// The connection has not joined this session.
    #[error("not joined to this session")]
    NotInSession,

    #[error("draft is paused")]
    DraftPaused,

    #[error("draft is complete")]
    DraftComplete,

    #[error("draft is not paused")]
    NotPaused,

    #[error("draft has not started")]
    NotStarted,

    #[error("draft has already started")]
    AlreadyStarted,

    /// `start_draft` needs a connected, ready captain on each side.
    #[error("both sides must be present and ready")]
    SidesNotReady,

    #[error("an edit is already pending")]
    EditPending,

    #[error("no edit is pending")]
    NoPendingEdit,

    /// Already picked or banned somewhere in this draft.
    #[error("champion {0} is unavailable")]
    ChampionUnavailable(ChampionId),

    /// `lock_in` without a champion and without a prior selection.
    #[error("no champion selected")]
    NoSelection,

    #[error("invalid slot: {0}")]
    InvalidSlot(String),

    #[error("edit does not change the slot")]
    EditUnchanged,

    #[error("malformed command: {0}")]
    Malformed(String),

    #[error("invalid roster: {0}")]
    InvalidRoster(String),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {0} already exists")]
    AlreadyExists(SessionId),

    /// The session's mailbox is closed (the actor retired or stopped).
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}

impl DraftError {
    /// HTTP-style status code sent to clients.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotYourTurn { .. }
            | Self::NotCaptain(_)
            | Self::Spectator
            | Self::NotInSession => 403,
            Self::DraftPaused
            | Self::DraftComplete
            | Self::NotPaused
            | Self::NotStarted
            | Self::AlreadyStarted
            | Self::SidesNotReady
            | Self::EditPending
            | Self::NoPendingEdit
            | Self::ChampionUnavailable(_)
            | Self::AlreadyExists(_) => 409,
            Self::NoSelection
            | Self::InvalidSlot(_)
            | Self::EditUnchanged
            | Self::Malformed(_)
            | Self::InvalidRoster(_) => 400,
            Self::SessionNotFound(_) => 404,
            Self::Unavailable(_) => 503,
        }
    }
}
