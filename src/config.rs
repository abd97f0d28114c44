//! Layered node configuration: defaults, then an optional TOML file, then
//! `POWLEDGER_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_NAME: &str = "powledger";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub log: LogSettings,
    pub node: NodeSettings,
    pub consensus: ConsensusSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSettings {
    /// `host:port` of each peer, queried in this order.
    #[serde(default)]
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusSettings {
    pub peer_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// Keep the chain in memory only when unset.
    pub path: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("log.level", "info")?
            .set_default("node.peers", Vec::<String>::new())?
            .set_default("consensus.peer_timeout_ms", 5000)?;

        let builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("POWLEDGER")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("node.peers")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if settings.consensus.peer_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "consensus.peer_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(settings)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.consensus.peer_timeout_ms)
    }
}
