//! Wire protocol for pickban.
//!
//! This crate defines what clients and the draft server say to each other:
//!
//! - **Types** ([`Side`], [`ActionKind`], [`Phase`], [`DraftSnapshot`], …):
//!   the draft vocabulary shared by both ends.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`Envelope`]):
//!   closed tagged unions for everything that crosses the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Wire shape
//!
//! ```text
//! { "seq": 7, "timestamp": 1718000000000,
//!   "type": "lock_in", "payload": { "championId": "ahri" } }
//! ```
//!
//! The protocol layer knows nothing about connections or sessions.

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{ClientMessage, Envelope, ServerMessage, now_millis};
pub use types::{
    ActionKind, ChampionId, DraftSnapshot, DraftStatus, EditProposal,
    PauseInfo, PerSide, Phase, SessionId, Side, UserId,
};
