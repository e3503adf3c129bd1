//! Draft sessions for pickban.
//!
//! Each draft runs as an isolated Tokio task (actor model) that owns its
//! state machine, roster, and participant list.
//!
//! # Key types
//!
//! - [`DraftMachine`]: turn order, timing, pause/resume, edits; returns
//!   [`Effect`]s instead of doing I/O
//! - [`Registry`]: creates, looks up, and reaps sessions by id
//! - [`SessionHandle`]: send commands to a running session actor
//! - [`DraftCommand`]: the closed set of draft commands
//! - [`SessionConfig`] / [`DraftConfig`]: session settings
//! - [`DraftRepository`]: where finished drafts are stored

mod command;
mod config;
mod error;
mod machine;
pub mod phase;
mod persistence;
mod registry;
mod roster;
mod session;

pub use command::DraftCommand;
pub use config::{DraftConfig, SessionConfig, SessionMode};
pub use error::DraftError;
pub use machine::{DraftMachine, Effect};
pub use persistence::{
    DraftRepository, DraftResult, MemoryRepository, NoopRepository,
    Persistence, PersistenceError, PersistRequest, RecordedAction,
};
pub use registry::Registry;
pub use roster::{MAX_TEAM_SIZE, Roster, Seat, TeamRoster, TeamSide};
pub use session::{
    ConnectionId, JoinAck, OutboundSender, SessionHandle, SessionInfo,
};
