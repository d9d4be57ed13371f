use crate::client::client::BotClient;
use crate::config::ClientConfig;
use crate::error::Result;

/// Registers, waits for a game and sends the configured move.
/// Returns the server's answer to the move.
pub async fn simple_client(config: ClientConfig) -> Result<String> {
    let client = BotClient::from_config(&config)?;
    client.register_and_play(&config.mov).await
}

/// Registration only; returns the server's first reply.
pub async fn register_client(config: ClientConfig) -> Result<String> {
    let client = BotClient::from_config(&config)?;
    client.submit_registration().await
}
