use std::env;

use anyhow::Context;
use tokio::time::{sleep, Duration};
use tracing::info;

use wartemis_bot::{logging, GameHandle, MatchConfig, Reception};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let path = env::args().nth(1).unwrap_or_else(|| "match_config.json".to_string());
    let match_config = MatchConfig::load(&path)?;

    let reception = Reception::new();
    let listener = tokio::net::TcpListener::bind(&match_config.addr).await
        .with_context(|| format!("failed to bind {}", match_config.addr))?;
    info!(addr = %match_config.addr, "running server, bots register at /register");
    tokio::spawn(reception.clone().serve(listener));

    run_lobby(reception, match_config).await
}

async fn run_lobby(reception: Reception, match_config: MatchConfig) -> anyhow::Result<()> {
    loop {
        let registered = reception.registered_bots();
        let missing: Vec<&String> = match_config.bots.iter()
            .filter(|name| !registered.contains(*name))
            .collect();
        if missing.is_empty() {
            break;
        }
        info!("waiting for {:?}", missing);
        sleep(Duration::from_millis(1000)).await;
    }

    let game = reception.start_game(&match_config.bots)?;
    collect_moves(game, match_config.bots.len()).await;
    Ok(())
}

async fn collect_moves(mut game: GameHandle, expected: usize) {
    for _ in 0..expected {
        match game.next_move().await {
            Some(mov) => info!(access_key = %mov.access_key, "move {}", mov.mov),
            None => break,
        }
    }
    info!(endpoint = %game.endpoint(), "all moves in");
}
