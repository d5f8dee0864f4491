use std::sync::Arc;

use clap::Args;
use serde_json::Value;

use common::messenger::{inbound_channel, ChannelMessenger};
use common::prelude::{FileStore, MessageRouter, SecretKey};
use common::router::{RouterError, DEFAULT_DEDUP_CAPACITY};
use common::storage::{Record, StorageError};

use hexhoot_daemon::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Display name for the new profile
    #[arg(long)]
    pub name: Option<String>,

    /// Log in with an existing private key (64 hex chars) instead of generating one
    #[arg(long)]
    pub key: Option<String>,

    /// Control API port (default: 43900)
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Start without the iroh overlay transport
    #[arg(long)]
    pub no_overlay: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] hexhoot_daemon::state::StateError),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("failed to open store: {0}")]
    Store(#[from] StorageError),
    #[error("failed to write profile: {0}")]
    Router(#[from] RouterError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let key = match &self.key {
            Some(hex) => {
                Some(SecretKey::from_hex(hex).map_err(|e| InitError::InvalidKey(e.to_string()))?)
            }
            None => None,
        };

        let mut config = AppConfig::default();
        if let Some(port) = self.api_port {
            config.api_port = port;
        }
        config.overlay.enabled = !self.no_overlay;

        let state = AppState::init(ctx.config_path.clone(), Some(config), key)?;
        let secret = state.load_key()?;

        // Seed the store offline; the daemon picks the profile up on start.
        let store = FileStore::open(&state.store_path).await?;
        let (_inbound_tx, inbound_rx) = inbound_channel();
        let router = MessageRouter::new(
            secret.clone(),
            Arc::new(store),
            ChannelMessenger::new(Vec::new(), inbound_rx),
            DEFAULT_DEDUP_CAPACITY,
        );
        let mut profile = Record::new();
        if let Some(name) = &self.name {
            profile.insert("name".to_string(), Value::String(name.clone()));
        }
        let profile = router.login(&secret.to_hex(), profile).await?;

        let output = format!(
            "Initialized hexhoot directory at: {}\n\
             - Public key: {}\n\
             - Name: {}\n\
             - Key: {}\n\
             - Store: {}\n\
             - Config: {}\n\
             - API port: {}\n\
             - Overlay: {}",
            state.hexhoot_dir.display(),
            profile.key,
            profile.name.as_deref().unwrap_or("(unset)"),
            state.key_path.display(),
            state.store_path.display(),
            state.config_path.display(),
            state.config.api_port,
            if state.config.overlay.enabled {
                "enabled"
            } else {
                "disabled"
            },
        );

        Ok(output)
    }
}
