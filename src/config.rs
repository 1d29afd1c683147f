//! TOML configuration for a warden run.
//!
//! Operator-facing primitives only (integers, booleans, strings) so the
//! config file stays readable:
//!
//! ```toml
//! timeout_seconds = 3
//!
//! [telegram]
//! bot_token = "123456:ABC"
//! chat_id = 123456789
//!
//! [[chains]]
//! name = "gaia-mainnet"
//! node_url = "http://10.0.0.5:26657/status"
//! reference_node_url = "https://rpc.example.org/status"
//! backup_reference_node_url = "https://rpc-backup.example.org/status"
//! ```

use std::{
    collections::HashSet,
    env, fs,
    num::ParseIntError,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

pub const TELEGRAM_BOT_TOKEN_ENV: &str = "NODE_WARDEN_TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHAT_ID_ENV: &str = "NODE_WARDEN_TELEGRAM_CHAT_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid integer in env var {name}: {source}")]
    InvalidInteger { name: String, source: ParseIntError },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Shared by every HTTP request in a run.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// When set, the report is logged instead of delivered to Telegram.
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Unique identifier; also the key into the voting power store.
    pub name: String,
    pub node_url: String,
    pub reference_node_url: String,
    pub backup_reference_node_url: String,
    /// Maximum tolerated height difference against the reference node.
    #[serde(default = "default_block_height_margin")]
    pub block_height_margin: u64,
    #[serde(default = "default_min_peers")]
    pub min_peers: usize,
    #[serde(default = "default_voting_power_change_threshold")]
    pub voting_power_change_threshold: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl AppConfig {
    /// Reads and parses the TOML file, then applies env overrides for
    /// the Telegram credentials. Validation is separate so CLI
    /// overrides can be merged in between.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: AppConfig = toml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// `NODE_WARDEN_TELEGRAM_BOT_TOKEN` / `NODE_WARDEN_TELEGRAM_CHAT_ID`
    /// take precedence over the `[telegram]` table and may supply it
    /// entirely.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let token = env::var(TELEGRAM_BOT_TOKEN_ENV).ok();
        let chat_id = match env::var(TELEGRAM_CHAT_ID_ENV) {
            Ok(raw) => Some(raw.parse::<i64>().map_err(|source| {
                ConfigError::InvalidInteger {
                    name: TELEGRAM_CHAT_ID_ENV.to_owned(),
                    source,
                }
            })?),
            Err(_) => None,
        };

        match self.telegram.as_mut() {
            Some(telegram) => {
                if let Some(token) = token {
                    telegram.bot_token = token;
                }
                if let Some(chat_id) = chat_id {
                    telegram.chat_id = chat_id;
                }
            }
            None => {
                if let (Some(bot_token), Some(chat_id)) = (token, chat_id) {
                    self.telegram = Some(TelegramConfig { bot_token, chat_id });
                }
            }
        }

        Ok(())
    }

    /// Validate configuration values, returning an error on failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "timeout_seconds must be > 0".to_owned(),
            ));
        }

        if !self.test_mode {
            match &self.telegram {
                Some(telegram) if !telegram.bot_token.is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(
                        "a [telegram] table with a bot_token is required unless test_mode is set"
                            .to_owned(),
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if chain.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "chain name must not be empty".to_owned(),
                ));
            }
            if !seen.insert(chain.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate chain name: {}",
                    chain.name
                )));
            }
            for (field, url) in [
                ("node_url", &chain.node_url),
                ("reference_node_url", &chain.reference_node_url),
                ("backup_reference_node_url", &chain.backup_reference_node_url),
            ] {
                if url.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "{field} must not be empty for chain {}",
                        chain.name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn default_timeout_seconds() -> u64 {
    3
}

fn default_state_path() -> PathBuf {
    PathBuf::from("voting_power.json")
}

fn default_block_height_margin() -> u64 {
    5
}

fn default_min_peers() -> usize {
    5
}

fn default_voting_power_change_threshold() -> u64 {
    150
}

fn default_enabled() -> bool {
    true
}
