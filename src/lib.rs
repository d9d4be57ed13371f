extern crate tokio;
extern crate serde;
#[macro_use]
extern crate futures;
extern crate tokio_tungstenite;

pub mod error;
pub mod config;
pub mod messages;
pub mod websocket;
pub mod client;
pub mod reception;
pub mod logging;

pub use error::{ClientError, ReceptionError, Result};
pub use config::{ClientConfig, MatchConfig};
pub use client::client::{BotClient, Registration, ServerAddress};
pub use reception::{Reception, GameHandle};
