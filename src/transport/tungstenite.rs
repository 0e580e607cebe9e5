//! WebSocket transport over tokio-tungstenite

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::{SocketSink, SocketStream, Transport};
use crate::error::SessionError;

type WsStreamInner = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport: one `connect_async` per call, split into halves.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, Box<dyn SocketStream>), SessionError> {
        let (socket, response) = connect_async(url).await.map_err(|e| {
            warn!(%url, error = %e, "websocket connect failed");
            SessionError::SocketError
        })?;
        debug!(%url, status = %response.status(), "websocket handshake complete");

        let (sink, stream) = socket.split();
        Ok((Box::new(WsSink { inner: sink }), Box::new(WsStream { inner: stream })))
    }
}

struct WsSink {
    inner: SplitSink<WsStreamInner, WsMessage>,
}

#[async_trait]
impl SocketSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        self.inner
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| {
                warn!(error = %e, "websocket send failed");
                SessionError::SocketError
            })
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.inner.close().await.map_err(|e| {
            debug!(error = %e, "websocket close handshake failed");
            SessionError::SocketClosed
        })
    }
}

struct WsStream {
    inner: SplitStream<WsStreamInner>,
}

#[async_trait]
impl SocketStream for WsStream {
    async fn next_text(&mut self) -> Option<Result<String, SessionError>> {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Text(text))) => return Some(Ok(text)),
                Some(Ok(WsMessage::Close(_))) | None => return None,
                // control and binary frames are not part of the protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "websocket read failed");
                    return Some(Err(SessionError::SocketError));
                }
            }
        }
    }
}
