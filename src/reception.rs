//! Server side of the bot protocol.
//!
//! Bots register on `/register` and keep that socket open. Once a game is
//! started the reception sends each player the game's endpoint path over
//! that socket, and the bots deliver their moves on the endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::{FutureExt, SinkExt, StreamExt};
use rand::Rng;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use crate::client::client::REGISTER_PATH;
use crate::error::ReceptionError;
use crate::messages::{encode, MoveRequest, RegistrationRequest, RegistrationResponse};
use crate::websocket::WsConnection;

pub const PARSE_FAILED_REPLY: &str = "Failed to parse registration request";
pub const NAME_TAKEN_REPLY: &str = "Botname already taken";
pub const ACCEPTED_REPLY: &str = r#"{"message": "Accepted"}"#;

struct BotEntry {
    access_key: String,
    // feeds the bot's registration socket
    tx: mpsc::UnboundedSender<String>,
}

struct GameEntry {
    access_keys: HashSet<String>,
    moves: mpsc::UnboundedSender<MoveRequest>,
}

#[derive(Default)]
struct ReceptionState {
    bots: HashMap<String, BotEntry>,
    games: HashMap<String, GameEntry>,
}

impl ReceptionState {
    fn prune_disconnected(&mut self) {
        self.bots.retain(|name, bot| {
            let alive = !bot.tx.is_closed();
            if !alive {
                debug!(bot = %name, "could not reach bot");
            }
            alive
        });
    }

    /// Returns false when a live bot already holds the name.
    fn register_bot(
        &mut self,
        name: &str,
        access_key: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> bool {
        self.prune_disconnected();
        if self.bots.contains_key(name) {
            return false;
        }
        self.bots.insert(name.to_string(), BotEntry {
            access_key: access_key.to_string(),
            tx,
        });
        true
    }

    fn deregister_bot(&mut self, name: &str, access_key: &str) {
        let owned = self.bots.get(name)
            .map(|bot| bot.access_key == access_key)
            .unwrap_or(false);
        if owned {
            self.bots.remove(name);
        }
    }

    fn fresh_endpoint(&self) -> String {
        loop {
            let id: [u8; 4] = rand::thread_rng().gen();
            let endpoint = format!("/game/{}", hex::encode(id));
            if !self.games.contains_key(&endpoint) {
                return endpoint;
            }
        }
    }
}

enum Route {
    Register,
    Game(String),
}

/// Shared handle to the bot registry and the running games.
#[derive(Clone, Default)]
pub struct Reception {
    inner: Arc<Mutex<ReceptionState>>,
}

impl Reception {
    pub fn new() -> Self {
        Reception::default()
    }

    fn lock(&self) -> MutexGuard<'_, ReceptionState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accept loop; every connection gets its own task.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted tcp connection");
                    tokio::spawn(self.clone().accept_connection(stream));
                }
                Err(err) => {
                    warn!(%err, "accept failed, shutting down");
                    return;
                }
            }
        }
    }

    /// Names of bots whose registration socket is still open.
    pub fn registered_bots(&self) -> Vec<String> {
        let mut state = self.lock();
        state.prune_disconnected();
        let mut names: Vec<String> = state.bots.keys().cloned().collect();
        names.sort();
        names
    }

    /// Opens a game endpoint and tells every named bot where it is.
    pub fn start_game(&self, bot_names: &[String]) -> Result<GameHandle, ReceptionError> {
        if bot_names.is_empty() {
            return Err(ReceptionError::NoPlayers);
        }

        let mut state = self.lock();
        state.prune_disconnected();

        let mut players = Vec::with_capacity(bot_names.len());
        for name in bot_names {
            match state.bots.get(name) {
                Some(bot) => players.push((name, bot.access_key.clone(), bot.tx.clone())),
                None => {
                    info!(bot = %name, "participating bot no longer available");
                    return Err(ReceptionError::BotUnavailable(name.clone()));
                }
            }
        }

        let endpoint = state.fresh_endpoint();
        let (tx, rx) = mpsc::unbounded_channel();
        let access_keys = players.iter().map(|(_, key, _)| key.clone()).collect();
        state.games.insert(endpoint.clone(), GameEntry { access_keys, moves: tx });

        for (name, _, bot_tx) in players {
            if bot_tx.send(endpoint.clone()).is_err() {
                warn!(bot = %name, "could not notify player");
                state.games.remove(&endpoint);
                return Err(ReceptionError::BotUnavailable(name.clone()));
            }
        }
        drop(state);

        info!(%endpoint, players = bot_names.len(), "game started");
        Ok(GameHandle {
            endpoint,
            moves: rx,
            reception: self.clone(),
        })
    }

    fn route(&self, path: &str) -> Option<Route> {
        if path == REGISTER_PATH {
            return Some(Route::Register);
        }
        if self.lock().games.contains_key(path) {
            Some(Route::Game(path.to_string()))
        } else {
            None
        }
    }

    async fn accept_connection(self, stream: TcpStream) {
        let mut route = None;
        let callback = |req: &Request, resp: Response| {
            let path = req.uri().path();
            match self.route(path) {
                Some(r) => {
                    route = Some(r);
                    Ok(resp)
                }
                None => {
                    warn!(%path, "connection to unknown endpoint");
                    let mut err = ErrorResponse::new(Some("unknown endpoint".to_string()));
                    *err.status_mut() = StatusCode::NOT_FOUND;
                    Err(err)
                }
            }
        };

        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
            Ok(ws_stream) => ws_stream,
            Err(err) => {
                debug!(%err, "websocket handshake failed");
                return;
            }
        };

        match route {
            Some(Route::Register) => self.handle_registration(ws_stream).await,
            Some(Route::Game(endpoint)) => self.handle_move(ws_stream, endpoint).await,
            None => {}
        }
    }

    async fn handle_registration(self, ws_stream: WebSocketStream<TcpStream>) {
        let mut conn = WsConnection::from_stream(ws_stream, None);

        let text = match conn.recv_text("registration request").await {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "error reading registration");
                return;
            }
        };
        let request: RegistrationRequest = match serde_json::from_str(&text) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "failed to register bot");
                let _ = conn.send_text(PARSE_FAILED_REPLY.to_string()).await;
                conn.close().await;
                return;
            }
        };
        let bot_name = request.bot_name;

        let key: [u8; 16] = rand::thread_rng().gen();
        let access_key = hex::encode(key);
        let (tx, rx) = mpsc::unbounded_channel();

        if !self.lock().register_bot(&bot_name, &access_key, tx) {
            info!(bot = %bot_name, "attempt to register bot failed: name already registered");
            let _ = conn.send_text(NAME_TAKEN_REPLY.to_string()).await;
            conn.close().await;
            return;
        }

        let sent = match encode(&RegistrationResponse { access_key: access_key.clone() }) {
            Ok(reply) => conn.send_text(reply).await,
            Err(err) => Err(err),
        };
        match sent {
            Ok(()) => {
                info!(bot = %bot_name, "bot successfully registered");
                forward_game_notifications(conn.into_inner(), rx).await;
                info!(bot = %bot_name, "bot disconnected");
            }
            Err(err) => warn!(bot = %bot_name, %err, "failed sending access key to bot"),
        }

        self.lock().deregister_bot(&bot_name, &access_key);
    }

    async fn handle_move(self, ws_stream: WebSocketStream<TcpStream>, endpoint: String) {
        let mut conn = WsConnection::from_stream(ws_stream, None);

        let text = match conn.recv_text("move").await {
            Ok(text) => text,
            Err(err) => {
                warn!(%endpoint, %err, "error reading move");
                return;
            }
        };
        let mov: MoveRequest = match serde_json::from_str(&text) {
            Ok(mov) => mov,
            Err(err) => {
                warn!(%endpoint, %err, "dropping malformed move");
                conn.close().await;
                return;
            }
        };

        let accepted = {
            let state = self.lock();
            match state.games.get(&endpoint) {
                Some(game) if game.access_keys.contains(&mov.access_key) => {
                    game.moves.send(mov).is_ok()
                }
                _ => false,
            }
        };
        if !accepted {
            warn!(%endpoint, "move refused");
            conn.close().await;
            return;
        }

        info!(%endpoint, "received move");
        if let Err(err) = conn.send_text(ACCEPTED_REPLY.to_string()).await {
            warn!(%endpoint, %err, "could not acknowledge move");
        }
        conn.close().await;
    }
}

/// Keeps a registration socket open and passes game endpoints down it
/// until the bot goes away.
async fn forward_game_notifications(
    ws_stream: WebSocketStream<TcpStream>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let mut ws_stream = ws_stream.fuse();
    loop {
        select!(
            endpoint = rx.recv().fuse() => {
                let endpoint = match endpoint {
                    Some(endpoint) => endpoint,
                    None => return,
                };
                if let Err(err) = ws_stream.send(WsMessage::Text(endpoint)).await {
                    warn!(%err, "could not notify player");
                    return;
                }
            }
            ws_msg = ws_stream.next() => {
                match ws_msg {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {}
                }
            }
        )
    }
}

/// A running game: its endpoint and the moves bots deliver there.
///
/// Dropping the handle closes the endpoint.
pub struct GameHandle {
    endpoint: String,
    moves: mpsc::UnboundedReceiver<MoveRequest>,
    reception: Reception,
}

impl GameHandle {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Next accepted move, in arrival order.
    pub async fn next_move(&mut self) -> Option<MoveRequest> {
        self.moves.recv().await
    }
}

impl Drop for GameHandle {
    fn drop(&mut self) {
        self.reception.lock().games.remove(&self.endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_live_name_is_refused() {
        let mut state = ReceptionState::default();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(state.register_bot("QBot", "k1", tx1));
        assert!(!state.register_bot("QBot", "k2", tx2));
        assert_eq!(state.bots["QBot"].access_key, "k1");
    }

    #[test]
    fn disconnected_name_can_be_reused() {
        let mut state = ReceptionState::default();
        let (tx1, rx1) = mpsc::unbounded_channel();
        assert!(state.register_bot("QBot", "k1", tx1));
        drop(rx1);
        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(state.register_bot("QBot", "k2", tx2));
        assert_eq!(state.bots["QBot"].access_key, "k2");
    }

    #[test]
    fn deregister_only_removes_own_entry() {
        let mut state = ReceptionState::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        state.register_bot("QBot", "k1", tx);
        state.deregister_bot("QBot", "stale");
        assert!(state.bots.contains_key("QBot"));
        state.deregister_bot("QBot", "k1");
        assert!(state.bots.is_empty());
    }

    #[test]
    fn start_game_needs_players() {
        let reception = Reception::new();
        assert_eq!(reception.start_game(&[]).err(), Some(ReceptionError::NoPlayers));
        assert_eq!(
            reception.start_game(&["ghost".to_string()]).err(),
            Some(ReceptionError::BotUnavailable("ghost".to_string()))
        );
    }

    #[test]
    fn game_notifies_players_and_closes_on_drop() {
        let reception = Reception::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        reception.lock().register_bot("QBot", "k1", tx);

        let game = reception.start_game(&["QBot".to_string()]).unwrap();
        assert!(game.endpoint().starts_with("/game/"));
        assert_eq!(rx.try_recv().unwrap(), game.endpoint());
        assert!(matches!(reception.route(game.endpoint()), Some(Route::Game(_))));

        let endpoint = game.endpoint().to_string();
        drop(game);
        assert!(reception.route(&endpoint).is_none());
        assert!(matches!(reception.route(REGISTER_PATH), Some(Route::Register)));
    }
}
