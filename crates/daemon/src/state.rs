//! On-disk state for a HexHoot directory (~/.hexhoot by default)
//!
//! Holds the config, the identity key and the message store. Used by the
//! CLI to find the daemon and by the daemon to build its service config.

use std::time::Duration;
use std::{fs, path::PathBuf};

use common::prelude::SecretKey;
use common::router::DEFAULT_DEDUP_CAPACITY;
use common::transport::{local, LocalConfig, OverlayConfig};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "hexhoot";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEY_FILE_NAME: &str = "key.pem";
pub const STORE_FILE_NAME: &str = "store.hexhootjson";
pub const LOGS_DIR_NAME: &str = "logs";
/// Port of the localhost control API unless config.toml says otherwise
pub const DEFAULT_API_PORT: u16 = 43900;

/// Configuration stored in config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Port for the localhost control API
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub local: LocalSettings,
    #[serde(default)]
    pub overlay: OverlaySettings,
    /// How many recent chat ids are remembered for deduplication
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_local_port")]
    pub preferred_port: u16,
    #[serde(default = "default_port_attempts")]
    pub max_port_attempts: u16,
    #[serde(default = "default_true")]
    pub scan_subnets: bool,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlaySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_announce_timeout_secs")]
    pub announce_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_true() -> bool {
    true
}

fn default_local_port() -> u16 {
    local::DEFAULT_PORT
}

fn default_port_attempts() -> u16 {
    local::DEFAULT_PORT_ATTEMPTS
}

fn default_probe_timeout_ms() -> u64 {
    300
}

fn default_announce_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            preferred_port: default_local_port(),
            max_port_attempts: default_port_attempts(),
            scan_subnets: true,
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl LocalSettings {
    pub fn to_transport_config(&self) -> LocalConfig {
        LocalConfig {
            preferred_port: self.preferred_port,
            max_port_attempts: self.max_port_attempts,
            scan_subnets: self.scan_subnets,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            ..Default::default()
        }
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            announce_timeout_secs: default_announce_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl OverlaySettings {
    pub fn to_transport_config(&self) -> OverlayConfig {
        OverlayConfig {
            announce_timeout: Duration::from_secs(self.announce_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..Default::default()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            local: LocalSettings::default(),
            overlay: OverlaySettings::default(),
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the hexhoot directory (~/.hexhoot)
    pub hexhoot_dir: PathBuf,
    /// Path to the identity key PEM file
    pub key_path: PathBuf,
    /// Path to the message store snapshot
    pub store_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Default directory for log files
    pub logs_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the hexhoot directory path (custom or default ~/.hexhoot)
    pub fn hexhoot_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn paths(hexhoot_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            key_path: hexhoot_dir.join(KEY_FILE_NAME),
            store_path: hexhoot_dir.join(STORE_FILE_NAME),
            config_path: hexhoot_dir.join(CONFIG_FILE_NAME),
            logs_path: hexhoot_dir.join(LOGS_DIR_NAME),
            hexhoot_dir,
            config,
        }
    }

    /// Initialize a new hexhoot directory with a fresh identity.
    ///
    /// The store file is created by the first write.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
        key: Option<SecretKey>,
    ) -> Result<Self, StateError> {
        let hexhoot_dir = Self::hexhoot_dir(custom_path)?;

        if hexhoot_dir.join(CONFIG_FILE_NAME).exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&hexhoot_dir)?;
        let state = Self::paths(hexhoot_dir, config.unwrap_or_default());
        fs::create_dir_all(&state.logs_path)?;

        let key = match key {
            Some(key) => key,
            None => SecretKey::generate().map_err(|e| StateError::InvalidKey(e.to_string()))?,
        };
        fs::write(&state.key_path, key.to_pem())?;

        let config_toml = toml::to_string_pretty(&state.config)?;
        fs::write(&state.config_path, config_toml)?;

        Ok(state)
    }

    /// Load existing state from the hexhoot directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let hexhoot_dir = Self::hexhoot_dir(custom_path)?;

        if !hexhoot_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let key_path = hexhoot_dir.join(KEY_FILE_NAME);
        let config_path = hexhoot_dir.join(CONFIG_FILE_NAME);
        if !key_path.exists() {
            return Err(StateError::MissingFile(KEY_FILE_NAME.to_string()));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self::paths(hexhoot_dir, config))
    }

    /// Load the identity key from the key file
    pub fn load_key(&self) -> Result<SecretKey, StateError> {
        let pem = fs::read_to_string(&self.key_path)?;
        let key = SecretKey::from_pem(&pem).map_err(|e| StateError::InvalidKey(e.to_string()))?;
        Ok(key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("hexhoot directory not initialized. Run 'hexhoot init' first")]
    NotInitialized,

    #[error("hexhoot directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hh");

        let state = AppState::init(Some(path.clone()), None, None).unwrap();
        let key = state.load_key().unwrap();

        let loaded = AppState::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.config, AppConfig::default());
        assert_eq!(loaded.load_key().unwrap().public(), key.public());

        assert!(matches!(
            AppState::init(Some(path), None, None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().join("nope"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("api_port = 5000\n[overlay]\nenabled = false\n").unwrap();
        assert_eq!(config.api_port, 5000);
        assert!(!config.overlay.enabled);
        assert_eq!(config.overlay.connect_timeout_secs, 15);
        assert_eq!(config.local.preferred_port, 43946);
        assert_eq!(config.dedup_capacity, 20);
    }
}
