//! Shared helpers for the integration tests

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use wartemis_bot::Reception;

/// What the scripted peer does with one accepted connection.
pub struct Session {
    pub replies: Vec<String>,
    /// Keep the socket open after replying until the client goes away.
    pub hold_open: bool,
}

impl Session {
    pub fn reply(replies: &[&str]) -> Self {
        Session {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            hold_open: true,
        }
    }

    pub fn reply_then_close(replies: &[&str]) -> Self {
        Session {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            hold_open: false,
        }
    }

    pub fn silent() -> Self {
        Session { replies: Vec::new(), hold_open: true }
    }
}

/// Path and first text frame of a connection the scripted peer saw.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub body: String,
}

/// Starts a websocket peer that plays the given sessions in order,
/// one connection each. Returns its base address and a handle
/// yielding everything the clients sent.
pub async fn scripted_server(sessions: Vec<Session>) -> (String, JoinHandle<Vec<Seen>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for session in sessions {
            let (stream, _) = listener.accept().await.unwrap();
            let mut path = String::new();
            let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                path = req.uri().path().to_string();
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();

            let body = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => break text,
                    Some(Ok(_)) => continue,
                    other => panic!("client went away before sending: {:?}", other),
                }
            };
            seen.push(Seen { path, body });

            for reply in session.replies {
                ws.send(Message::Text(reply)).await.unwrap();
            }

            if session.hold_open {
                while let Some(Ok(_)) = ws.next().await {}
            } else {
                let _ = ws.close(None).await;
            }
        }
        seen
    });

    (format!("ws://{}", addr), handle)
}

/// Runs a reception on a free port and returns its base address.
pub async fn spawn_reception() -> (Reception, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let reception = Reception::new();
    tokio::spawn(reception.clone().serve(listener));
    (reception, format!("ws://{}", addr))
}

pub async fn wait_for_bots(reception: &Reception, names: &[&str]) {
    let all_there = async {
        loop {
            let registered = reception.registered_bots();
            if names.iter().all(|name| registered.iter().any(|r| r == name)) {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    };
    timeout(Duration::from_secs(5), all_there).await
        .expect("bots never showed up at the reception");
}
