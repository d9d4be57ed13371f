//! JSON configuration for the bundled binaries.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Settings for a single bot run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base address of the game server, e.g. `ws://localhost:8080`
    pub server: String,
    pub bot_name: String,
    /// Move sent once the game endpoint is known
    #[serde(rename = "move")]
    pub mov: String,
    /// Applies to connecting and to every wait for a server frame.
    /// Without it the client waits forever.
    pub timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server: "ws://localhost:8080".to_string(),
            bot_name: "QBot".to_string(),
            mov: "{}".to_string(),
            timeout_ms: None,
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Which bots the demo server waits for before starting a game.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    pub bots: Vec<String>,
    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl MatchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref())
    }
}

fn load_json<T>(path: &Path) -> Result<T>
    where T: for<'de> Deserialize<'de>
{
    let file = File::open(path).map_err(|source| ClientError::Config {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(file).map_err(|source| ClientError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}
