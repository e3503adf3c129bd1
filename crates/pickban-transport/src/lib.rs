//! Transport layer for pickban.
//!
//! A [`Connection`] moves opaque frames between the server and one peer.
//! The draft server reads and writes the same connection from one task
//! with `tokio::select!`, so `send` and `recv` must not block each other.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingUpgrade, WebSocketConnection, WebSocketTransport};

use std::net::SocketAddr;

/// One live connection to a peer.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame. UTF-8 payloads go out as text frames.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next data frame.
    ///
    /// Returns `Ok(None)` when the peer closed cleanly. Cancel-safe: a
    /// `recv` dropped mid-wait loses no frame.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn peer_addr(&self) -> SocketAddr;
}
