use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use common::messenger::{inbound_channel, ChannelMessenger};
use common::prelude::SecretKey;
use common::router::{MessageRouter, RouterError, RouterEvent};
use common::storage::{FileStore, MemoryStore, Record, Storage, StorageError};
use common::transport::{LocalNetworkTransport, OverlayTransport, Transport, TransportError};

use crate::ServiceConfig;

/// How many router events `GET /api/v0/events` can return.
pub const RECENT_EVENTS: usize = 100;

struct Inner {
    secret: SecretKey,
    router: MessageRouter,
    local: Option<LocalNetworkTransport>,
    overlay: Option<OverlayTransport>,
    events: Mutex<VecDeque<RouterEvent>>,
}

/// Everything the daemon's tasks and handlers share, built once at startup.
#[derive(Clone)]
pub struct State(Arc<Inner>);

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("identity", &self.0.secret.public())
            .field("router", &self.0.router)
            .finish()
    }
}

impl State {
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, StateSetupError> {
        let (inbound_tx, inbound_rx) = inbound_channel();
        let mut transports: Vec<Arc<dyn Transport>> = Vec::new();

        let local = match &config.local {
            Some(local_config) => {
                let transport = LocalNetworkTransport::new(
                    local_config.clone(),
                    config.secret.clone(),
                    inbound_tx.clone(),
                )?;
                // a bind failure only costs us local discovery
                match transport.initialize().await {
                    Ok(port) => {
                        tracing::info!(port, "local network transport listening");
                        transports.push(Arc::new(transport.clone()));
                        Some(transport)
                    }
                    Err(e) => {
                        tracing::error!("local network transport disabled: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        let overlay = config.overlay.as_ref().map(|overlay_config| {
            let transport = OverlayTransport::new(
                overlay_config.clone(),
                config.secret.clone(),
                inbound_tx.clone(),
            );
            transports.push(Arc::new(transport.clone()));
            transport
        });

        if transports.is_empty() {
            tracing::warn!("no transports enabled, messages will not leave this process");
        }

        let storage: Arc<dyn Storage> = match &config.store_path {
            Some(path) => Arc::new(FileStore::open(path).await?),
            None => Arc::new(MemoryStore::new()),
        };

        let messenger = ChannelMessenger::new(transports, inbound_rx);
        let router = MessageRouter::new(
            config.secret.clone(),
            storage,
            messenger,
            config.dedup_capacity,
        );

        // keeps the stored profile, refreshes the key and subscribes our channel
        router.login(&config.secret.to_hex(), Record::new()).await?;

        Ok(Self(Arc::new(Inner {
            secret: config.secret.clone(),
            router,
            local,
            overlay,
            events: Mutex::new(VecDeque::with_capacity(RECENT_EVENTS)),
        })))
    }

    pub fn secret(&self) -> &SecretKey {
        &self.0.secret
    }

    pub fn router(&self) -> &MessageRouter {
        &self.0.router
    }

    pub fn messenger(&self) -> &ChannelMessenger {
        self.0.router.messenger()
    }

    pub fn local(&self) -> Option<&LocalNetworkTransport> {
        self.0.local.as_ref()
    }

    pub fn overlay(&self) -> Option<&OverlayTransport> {
        self.0.overlay.as_ref()
    }

    pub fn record_event(&self, event: RouterEvent) {
        let mut events = self.0.events.lock();
        if events.len() == RECENT_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Recent router events, oldest first.
    pub fn recent_events(&self) -> Vec<RouterEvent> {
        self.0.events.lock().iter().cloned().collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("router error: {0}")]
    Router(#[from] RouterError),
}
