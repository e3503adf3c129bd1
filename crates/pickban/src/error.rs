//! Unified error type for the pickban server.

use pickban_draft::DraftError;
use pickban_protocol::ProtocolError;
use pickban_transport::TransportError;

use crate::AuthError;

/// Top-level error wrapping every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum PickbanError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A [`ServerConfig`](crate::ServerConfig) the server cannot run with.
    #[error("invalid config: {0}")]
    Config(String),
}
