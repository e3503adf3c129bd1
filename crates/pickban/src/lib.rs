//! # pickban
//!
//! Real-time ban/pick draft server.
//!
//! Two captains (1v1) or two five-player teams take turns banning and
//! picking champions against a phase timer while spectators watch. Every
//! draft runs in its own session actor; this crate accepts WebSocket
//! connections, authenticates them, and routes their commands to the
//! right session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pickban::prelude::*;
//!
//! # async fn run() -> Result<(), PickbanError> {
//! let server = PickbanServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(DevAuthenticator)
//!     .await?;
//! server
//!     .create_session(SessionId::new("grand-final"), SessionConfig::default())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod config;
mod error;
mod handler;
mod server;

pub use auth::{AuthError, Authenticator, DevAuthenticator};
pub use config::ServerConfig;
pub use error::PickbanError;
pub use server::{PROTOCOL_VERSION, PickbanServer, PickbanServerBuilder};

pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, DevAuthenticator, PROTOCOL_VERSION,
        PickbanError, PickbanServer, PickbanServerBuilder, ServerConfig,
    };
    pub use pickban_draft::{
        DraftConfig, DraftError, DraftRepository, MemoryRepository,
        NoopRepository, Registry, SessionConfig, SessionHandle, SessionInfo,
        SessionMode, TeamRoster, TeamSide,
    };
    pub use pickban_protocol::{
        ActionKind, ChampionId, ClientMessage, Codec, DraftSnapshot,
        DraftStatus, Envelope, JsonCodec, ServerMessage, SessionId, Side,
        UserId,
    };
}
