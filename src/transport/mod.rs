//! Socket transport seam
//!
//! The session coordinator talks to an abstract [`Transport`] so the
//! connection lifecycle (reconnect, teardown, frame routing) can be
//! exercised against an in-memory pair as well as a real WebSocket.

pub mod mock;
pub mod tungstenite;

use async_trait::async_trait;

use crate::error::SessionError;

pub use tungstenite::WsTransport;

/// Opens sockets. One call, one socket; the caller owns lifecycle.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, Box<dyn SocketStream>), SessionError>;
}

/// Write half of an open socket.
#[async_trait]
pub trait SocketSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError>;
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Read half of an open socket. Yields text frames in delivery order;
/// `None` means the peer closed, `Err` a transport failure.
#[async_trait]
pub trait SocketStream: Send {
    async fn next_text(&mut self) -> Option<Result<String, SessionError>>;
}
