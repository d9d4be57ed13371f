use std::env;

use wartemis_bot::client::simple_client::register_client;
use wartemis_bot::{logging, ClientConfig};

// Registers a bot and prints the server's first reply.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = match env::args().nth(1) {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    let reply = register_client(config).await?;
    println!("Server response: {}", reply);
    Ok(())
}
