//! Envelope and the two closed message unions.
//!
//! Every frame is one [`Envelope`]: a sequence number, a sender timestamp and
//! a `type`/`payload` pair produced by the flattened message enum. Unknown
//! `type` values fail to decode, which the server reports as a 400 error.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::types::{
    ActionKind, ChampionId, DraftSnapshot, EditProposal, PerSide, Side, UserId,
};

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wrapper carried by every frame in both directions.
///
/// `seq` is per-connection and per-direction; the server numbers its own
/// frames and never trusts the client's. `timestamp` is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(flatten)]
    pub message: M,
}

impl<M> Envelope<M> {
    /// Wraps `message`, stamping it with the current wall clock.
    pub fn new(seq: u64, message: M) -> Self {
        Self {
            seq,
            timestamp: now_millis(),
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client may send.
///
/// Commands with nothing to say still carry an empty object:
/// `{"type":"start_draft","payload":{}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// First frame on a connection.
    Hello {
        version: u32,
        #[serde(default)]
        token: Option<String>,
    },
    Heartbeat {
        client_time: u64,
    },
    JoinSession {
        session_id: crate::types::SessionId,
        /// Preferred side in 1v1 mode. Ignored in team mode.
        #[serde(default)]
        side: Option<Side>,
    },
    LeaveSession {},
    SelectChampion {
        champion_id: ChampionId,
    },
    /// `None` clears the hover.
    HoverChampion {
        #[serde(default)]
        champion_id: Option<ChampionId>,
    },
    /// Locks `champion_id`, or the current selection when absent.
    LockIn {
        #[serde(default)]
        champion_id: Option<ChampionId>,
    },
    SetReady {
        ready: bool,
    },
    StartDraft {},
    PauseDraft {},
    ResumeReady {
        ready: bool,
    },
    ProposeEdit {
        slot_type: ActionKind,
        side: Side,
        slot_index: usize,
        champion_id: ChampionId,
    },
    RespondEdit {
        accept: bool,
    },
}

impl ClientMessage {
    /// The wire `type` string, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Heartbeat { .. } => "heartbeat",
            Self::JoinSession { .. } => "join_session",
            Self::LeaveSession {} => "leave_session",
            Self::SelectChampion { .. } => "select_champion",
            Self::HoverChampion { .. } => "hover_champion",
            Self::LockIn { .. } => "lock_in",
            Self::SetReady { .. } => "set_ready",
            Self::StartDraft {} => "start_draft",
            Self::PauseDraft {} => "pause_draft",
            Self::ResumeReady { .. } => "resume_ready",
            Self::ProposeEdit { .. } => "propose_edit",
            Self::RespondEdit { .. } => "respond_edit",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Reply to `hello`.
    Welcome {
        user_id: UserId,
        server_time: u64,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },
    /// Sent only to the joining connection.
    SessionJoined {
        session_id: crate::types::SessionId,
        side: Option<Side>,
        is_captain: bool,
        snapshot: DraftSnapshot,
    },
    PlayerJoined {
        user_id: UserId,
        side: Option<Side>,
        is_captain: bool,
    },
    PlayerLeft {
        user_id: UserId,
        side: Option<Side>,
    },
    ReadyChanged {
        blue: bool,
        red: bool,
    },
    DraftStarted {
        phase_count: usize,
        timer_duration_ms: u64,
    },
    PhaseChanged {
        current_phase: usize,
        current_side: Side,
        action_kind: ActionKind,
        timer_remaining_ms: u64,
    },
    ChampionSelected {
        phase: usize,
        side: Side,
        action_kind: ActionKind,
        champion_id: ChampionId,
        auto_selected: bool,
    },
    ChampionHovered {
        side: Side,
        champion_id: Option<ChampionId>,
    },
    DraftPaused {
        paused_by: UserId,
        side: Side,
        timer_frozen: u64,
        max_pause_time: Option<u64>,
    },
    DraftResumed {
        timer_remaining: u64,
    },
    ResumeReadyChanged {
        blue: bool,
        red: bool,
    },
    /// `seconds` counts down to 0; `cancelled` means the countdown stopped.
    ResumeCountdown {
        seconds: u32,
        cancelled: bool,
    },
    EditProposed(EditProposal),
    EditApplied {
        slot_type: ActionKind,
        side: Side,
        slot_index: usize,
        old_champion_id: ChampionId,
        new_champion_id: ChampionId,
    },
    EditRejected {
        proposed_by: UserId,
        slot_type: ActionKind,
        side: Side,
        slot_index: usize,
        expired: bool,
        cancelled: bool,
    },
    DraftCompleted {
        picks: PerSide<Vec<ChampionId>>,
        bans: PerSide<Vec<ChampionId>>,
    },
    /// Remaining time in milliseconds.
    Tick {
        remaining: u64,
        is_buffer_period: bool,
    },
    Expired {
        phase: usize,
        auto_selected: Option<ChampionId>,
    },
    Error {
        code: u16,
        message: String,
    },
    /// Last frame before the server closes the connection.
    Disconnect {
        reason: String,
    },
}

impl ServerMessage {
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// The wire `type` string, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::HeartbeatAck { .. } => "heartbeat_ack",
            Self::SessionJoined { .. } => "session_joined",
            Self::PlayerJoined { .. } => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::ReadyChanged { .. } => "ready_changed",
            Self::DraftStarted { .. } => "draft_started",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::ChampionSelected { .. } => "champion_selected",
            Self::ChampionHovered { .. } => "champion_hovered",
            Self::DraftPaused { .. } => "draft_paused",
            Self::DraftResumed { .. } => "draft_resumed",
            Self::ResumeReadyChanged { .. } => "resume_ready_changed",
            Self::ResumeCountdown { .. } => "resume_countdown",
            Self::EditProposed(_) => "edit_proposed",
            Self::EditApplied { .. } => "edit_applied",
            Self::EditRejected { .. } => "edit_rejected",
            Self::DraftCompleted { .. } => "draft_completed",
            Self::Tick { .. } => "tick",
            Self::Expired { .. } => "expired",
            Self::Error { .. } => "error",
            Self::Disconnect { .. } => "disconnect",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
