//! Error types for bot clients and the reception server.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Everything that can go wrong while talking to a game server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server address {address:?}: {reason}")]
    InvalidAddress {
        address: String,
        reason: &'static str,
    },

    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: WsError,
    },

    #[error("websocket error: {0}")]
    Transport(#[from] WsError),

    #[error("connection closed while waiting for {expected}")]
    Closed { expected: &'static str },

    #[error("expected a text frame for {expected}, got a binary frame")]
    UnexpectedFrame { expected: &'static str },

    #[error("malformed {expected}: {reason}")]
    MalformedResponse {
        expected: &'static str,
        reason: String,
    },

    #[error("registration rejected by server: {0}")]
    Rejected(String),

    #[error("timed out after {}ms waiting for {expected}", .duration.as_millis())]
    Timeout {
        expected: &'static str,
        duration: Duration,
    },

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to read config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures when the reception is asked to start a game.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceptionError {
    #[error("participating bot no longer available: {0}")]
    BotUnavailable(String),

    #[error("a game needs at least one player")]
    NoPlayers,
}
