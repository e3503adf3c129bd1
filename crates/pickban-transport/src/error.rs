use std::io;

/// Errors from accepting, reading or writing a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer went away while we were writing.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// Binding, accepting, or the WebSocket upgrade failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),
}
