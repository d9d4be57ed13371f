use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{ClientError, Result};

pub type ClientStream = MaybeTlsStream<TcpStream>;

/// A single websocket exchanging text frames.
///
/// The socket is closed when the connection is dropped, so whatever owns it
/// releases it on every exit path.
pub struct WsConnection<S = ClientStream> {
    stream: WebSocketStream<S>,
    timeout: Option<Duration>,
}

impl WsConnection<ClientStream> {
    pub async fn connect(url: &str, timeout: Option<Duration>) -> Result<Self> {
        let connecting = tokio_tungstenite::connect_async(url);
        let res = match timeout {
            Some(duration) => time::timeout(duration, connecting).await
                .map_err(|_elapsed| ClientError::Timeout {
                    expected: "websocket handshake",
                    duration,
                })?,
            None => connecting.await,
        };
        let (stream, _response) = res.map_err(|source| ClientError::Connect {
            url: url.to_string(),
            source,
        })?;
        debug!(url, "connected");
        Ok(WsConnection { stream, timeout })
    }
}

impl<S> WsConnection<S>
    where S: AsyncRead + AsyncWrite + Unpin
{
    pub fn from_stream(stream: WebSocketStream<S>, timeout: Option<Duration>) -> Self {
        WsConnection { stream, timeout }
    }

    pub async fn send_text(&mut self, text: String) -> Result<()> {
        debug!(frame = %text, "sending");
        self.stream.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    /// Waits for the next text frame, skipping control frames.
    pub async fn recv_text(&mut self, expected: &'static str) -> Result<String> {
        loop {
            let item = match self.timeout {
                Some(duration) => time::timeout(duration, self.stream.next()).await
                    .map_err(|_elapsed| ClientError::Timeout { expected, duration })?,
                None => self.stream.next().await,
            };
            if let Some(res) = text_frame(item, expected) {
                let text = res?;
                debug!(frame = %text, "received");
                return Ok(text);
            }
        }
    }

    pub async fn close(mut self) {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {}
            Err(err) => debug!(%err, "error while closing websocket"),
        }
    }

    pub fn into_inner(self) -> WebSocketStream<S> {
        self.stream
    }
}

/// Interprets one item read from a websocket stream.
///
/// Returns `None` for frames that carry no payload (ping, pong, raw frames)
/// so the caller keeps reading.
pub fn text_frame(
    item: Option<std::result::Result<WsMessage, WsError>>,
    expected: &'static str,
) -> Option<Result<String>> {
    match item {
        Some(Ok(WsMessage::Text(text))) => Some(Ok(text)),
        Some(Ok(WsMessage::Binary(_))) => {
            Some(Err(ClientError::UnexpectedFrame { expected }))
        }
        Some(Ok(WsMessage::Close(frame))) => {
            debug!(?frame, "peer closed the connection");
            Some(Err(ClientError::Closed { expected }))
        }
        Some(Ok(_)) => None,
        Some(Err(WsError::ConnectionClosed)) | Some(Err(WsError::AlreadyClosed)) | None => {
            Some(Err(ClientError::Closed { expected }))
        }
        Some(Err(err)) => Some(Err(ClientError::Transport(err))),
    }
}
