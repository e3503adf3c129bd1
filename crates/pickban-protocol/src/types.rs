//! Draft vocabulary shared by clients and server.
//!
//! Everything here travels on the wire, so the serde attributes are part of
//! the contract: ids are plain strings/numbers, enums are lowercase, struct
//! fields are camelCase.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An authenticated user. Issued by the external auth provider.
///
/// Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// Identifier of one draft session, chosen by the lobby that created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D-{}", self.0)
    }
}

/// A champion (the thing being banned or picked).
///
/// The catalogue lives elsewhere; the draft only compares ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChampionId(pub String);

impl ChampionId {
    /// Id recorded when a phase expires with nothing to lock in.
    pub const PLACEHOLDER: &'static str = "none";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn placeholder() -> Self {
        Self(Self::PLACEHOLDER.to_string())
    }

    /// The placeholder is not a champion, so it may repeat.
    pub fn is_placeholder(&self) -> bool {
        self.0 == Self::PLACEHOLDER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChampionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Side / ActionKind / Phase
// ---------------------------------------------------------------------------

/// One of the two competing parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Blue,
    Red,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Blue, Side::Red];

    pub fn opponent(self) -> Self {
        match self {
            Self::Blue => Self::Red,
            Self::Red => Self::Blue,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blue => f.write_str("blue"),
            Self::Red => f.write_str("red"),
        }
    }
}

/// Whether a phase (or slot) is a ban or a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Ban,
    Pick,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ban => f.write_str("ban"),
            Self::Pick => f.write_str("pick"),
        }
    }
}

/// One indexed turn of the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub index: usize,
    pub side: Side,
    pub action_kind: ActionKind,
}

// ---------------------------------------------------------------------------
// PerSide
// ---------------------------------------------------------------------------

/// A value held once per side: `{ "blue": …, "red": … }` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub blue: T,
    pub red: T,
}

impl<T> PerSide<T> {
    pub fn new(blue: T, red: T) -> Self {
        Self { blue, red }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Blue => &self.blue,
            Side::Red => &self.red,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Blue => &mut self.blue,
            Side::Red => &mut self.red,
        }
    }
}

impl PerSide<bool> {
    pub fn both(&self) -> bool {
        self.blue && self.red
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Coarse state of a session as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Lobby: participants gathering, `start_draft` not yet accepted.
    Waiting,
    Active,
    Paused,
    Complete,
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("Waiting"),
            Self::Active => f.write_str("Active"),
            Self::Paused => f.write_str("Paused"),
            Self::Complete => f.write_str("Complete"),
        }
    }
}

/// Who paused, and the timer value frozen at that moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseInfo {
    pub paused_by: UserId,
    pub side: Side,
    /// Milliseconds left when the pause began. Display only.
    pub timer_frozen: u64,
    /// Advisory pause limit in milliseconds. Not enforced.
    pub max_pause_time: Option<u64>,
}

/// A proposed retroactive change to an already-locked slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditProposal {
    pub proposed_by: UserId,
    pub proposed_side: Side,
    pub slot_type: ActionKind,
    pub side: Side,
    pub slot_index: usize,
    pub old_champion_id: ChampionId,
    pub new_champion_id: ChampionId,
    /// Unix epoch milliseconds.
    pub expires_at: u64,
}

/// Everything a client needs to render a session it just joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub session_id: SessionId,
    pub status: DraftStatus,
    pub phases: Vec<Phase>,
    pub current_phase: usize,
    pub timer_duration_ms: u64,
    pub timer_remaining_ms: u64,
    pub picks: PerSide<Vec<ChampionId>>,
    pub bans: PerSide<Vec<ChampionId>>,
    pub hovered: PerSide<Option<ChampionId>>,
    /// Pre-draft ready flags.
    pub ready: PerSide<bool>,
    pub pause: Option<PauseInfo>,
    pub resume_ready: Option<PerSide<bool>>,
    pub pending_edit: Option<EditProposal>,
}

// =========================================================================
// Tests
// =========================================================================
