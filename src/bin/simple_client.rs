use std::env;

use wartemis_bot::client::simple_client::simple_client;
use wartemis_bot::{logging, ClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = match env::args().nth(1) {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    let reply = simple_client(config).await?;
    println!("< {}", reply);
    Ok(())
}
