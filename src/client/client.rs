use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::messages::{
    encode, parse_game_endpoint, MoveRequest, RegistrationRequest, RegistrationResponse,
};
use crate::websocket::WsConnection;

pub const REGISTER_PATH: &str = "/register";

/// Base address of a game server: `ws://host:port` or `wss://host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress(String);

impl ServerAddress {
    pub fn parse(address: &str) -> Result<Self> {
        let trimmed = address.trim();
        let rest = trimmed.strip_prefix("ws://")
            .or_else(|| trimmed.strip_prefix("wss://"))
            .ok_or_else(|| ClientError::InvalidAddress {
                address: address.to_string(),
                reason: "expected a ws:// or wss:// address",
            })?;
        if rest.trim_end_matches('/').is_empty() {
            return Err(ClientError::InvalidAddress {
                address: address.to_string(),
                reason: "missing host",
            });
        }
        Ok(ServerAddress(trimmed.trim_end_matches('/').to_string()))
    }

    /// Full websocket url for a server path such as `/register`.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ServerAddress {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        ServerAddress::parse(s)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a successful registration hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub access_key: String,
    pub game_endpoint: String,
}

/// A bot talking to one game server.
///
/// Every operation opens its own connection and closes it before returning.
/// Nothing is retried. Without a timeout, a server that stops answering
/// stalls the call forever; wrap it or use [`BotClient::with_timeout`].
#[derive(Debug, Clone)]
pub struct BotClient {
    server: ServerAddress,
    bot_name: String,
    timeout: Option<Duration>,
}

impl BotClient {
    pub fn new(server: ServerAddress, bot_name: impl Into<String>) -> Self {
        BotClient {
            server,
            bot_name: bot_name.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let server = ServerAddress::parse(&config.server)?;
        Ok(BotClient {
            server,
            bot_name: config.bot_name.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn server(&self) -> &ServerAddress {
        &self.server
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    async fn open_registration(&self) -> Result<WsConnection> {
        let url = self.server.url_for(REGISTER_PATH);
        let mut conn = WsConnection::connect(&url, self.timeout).await?;
        let body = encode(&RegistrationRequest { bot_name: self.bot_name.clone() })?;
        conn.send_text(body).await?;
        info!(bot = %self.bot_name, %url, "registration sent");
        Ok(conn)
    }

    /// Sends the registration and returns the server's first reply untouched.
    pub async fn submit_registration(&self) -> Result<String> {
        let mut conn = self.open_registration().await?;
        let reply = conn.recv_text("registration response").await?;
        conn.close().await;
        Ok(reply)
    }

    /// Registers and waits until the server assigns a game.
    ///
    /// Expects exactly two frames: a JSON object carrying `accessKey`, then
    /// the raw game endpoint path.
    pub async fn register(&self) -> Result<Registration> {
        let mut conn = self.open_registration().await?;

        let reply = conn.recv_text("registration response").await?;
        let RegistrationResponse { access_key } = RegistrationResponse::parse(&reply)?;
        info!(bot = %self.bot_name, "registered, waiting for a game");

        let endpoint = conn.recv_text("game endpoint").await?;
        let game_endpoint = parse_game_endpoint(&endpoint)?;
        debug!(%game_endpoint, "game assigned");

        conn.close().await;
        Ok(Registration { access_key, game_endpoint })
    }

    /// Sends one move to a game endpoint and returns the reply verbatim.
    pub async fn play(&self, game_endpoint: &str, access_key: &str, mov: &str)
        -> Result<String>
    {
        let game_endpoint = parse_game_endpoint(game_endpoint)?;
        let url = self.server.url_for(&game_endpoint);
        let mut conn = WsConnection::connect(&url, self.timeout).await?;

        let body = encode(&MoveRequest {
            access_key: access_key.to_string(),
            mov: mov.to_string(),
        })?;
        conn.send_text(body).await?;
        info!(bot = %self.bot_name, %game_endpoint, "move sent");

        let reply = conn.recv_text("move response").await?;
        conn.close().await;
        Ok(reply)
    }

    pub async fn register_and_play(&self, mov: &str) -> Result<String> {
        let Registration { access_key, game_endpoint } = self.register().await?;
        self.play(&game_endpoint, &access_key, mov).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_strips_trailing_slash() {
        let addr = ServerAddress::parse("ws://localhost:8080/").unwrap();
        assert_eq!(addr.as_str(), "ws://localhost:8080");
        assert_eq!(addr.url_for(REGISTER_PATH), "ws://localhost:8080/register");
        assert_eq!(addr.url_for("/game/42"), "ws://localhost:8080/game/42");
    }

    #[test]
    fn secure_addresses_parse() {
        let addr: ServerAddress = "wss://api.wartemis.com".parse().unwrap();
        assert_eq!(addr.to_string(), "wss://api.wartemis.com");
    }

    #[test]
    fn http_addresses_are_refused() {
        let err = ServerAddress::parse("https://localhost:8080/socket").unwrap_err();
        assert!(matches!(err, ClientError::InvalidAddress { .. }));
        assert!(ServerAddress::parse("ws://").is_err());
    }

    #[test]
    fn bare_scheme_reports_missing_host() {
        for address in &["ws:///", "wss://", "ws://"] {
            match ServerAddress::parse(address) {
                Err(ClientError::InvalidAddress { reason, .. }) => {
                    assert_eq!(reason, "missing host", "for {:?}", address);
                }
                other => panic!("expected an invalid address, got {:?}", other),
            }
        }
    }

    #[test]
    fn client_from_config() {
        let config = ClientConfig {
            server: "ws://127.0.0.1:9000".to_string(),
            bot_name: "Robbot".to_string(),
            timeout_ms: Some(500),
            ..ClientConfig::default()
        };
        let client = BotClient::from_config(&config).unwrap();
        assert_eq!(client.bot_name(), "Robbot");
        assert_eq!(client.server().as_str(), "ws://127.0.0.1:9000");
        assert_eq!(client.timeout, Some(Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn play_refuses_relative_endpoint() {
        let client = BotClient::new(
            ServerAddress::parse("ws://127.0.0.1:1").unwrap(),
            "QBot",
        );
        let err = client.play("game/42", "abc123", "{}").await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse { .. }));
    }
}
