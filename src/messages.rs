use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;

use crate::error::{ClientError, Result};

/// First frame a bot sends on `/register`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub bot_name: String,
}

/// First frame the server answers a registration with.
/// Fields other than `accessKey` are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub access_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveRequest {
    pub access_key: String,
    #[serde(rename = "move")]
    pub mov: String,
}

impl RegistrationResponse {
    /// Refusals come back as plain text ("Botname already taken"),
    /// so a frame that does not even look like JSON counts as a rejection.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
            return Err(ClientError::Rejected(text.to_string()));
        }
        serde_json::from_str(text).map_err(|err| {
            ClientError::MalformedResponse {
                expected: "registration response",
                reason: err.to_string(),
            }
        })
    }
}

/// Checks the raw second registration frame.
pub fn parse_game_endpoint(text: &str) -> Result<String> {
    let endpoint = text.trim();
    if endpoint.is_empty() {
        return Err(ClientError::MalformedResponse {
            expected: "game endpoint",
            reason: "empty frame".to_string(),
        });
    }
    if !endpoint.starts_with('/') {
        return Err(ClientError::MalformedResponse {
            expected: "game endpoint",
            reason: format!("{:?} is not an absolute path", endpoint),
        });
    }
    Ok(endpoint.to_string())
}

/// Encodes a message as a text frame body.
///
/// Members are separated by `", "` and keys by `": "`, so
/// `RegistrationRequest { bot_name: "QBot" }` goes out as
/// `{"botName": "QBot"}`.
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    msg.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
        where W: ?Sized + io::Write
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
        where W: ?Sized + io::Write
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
        where W: ?Sized + io::Write
    {
        writer.write_all(b": ")
    }
}
