use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::hub::MemoryHub;
use crate::crypto::{PublicKey, SecretKey};
use crate::messenger::{inbound_channel, ChannelMessenger};
use crate::router::{MessageRouter, DEFAULT_DEDUP_CAPACITY};
use crate::storage::{MemoryStore, Record};

/// A fully wired instance (memory transport, messenger, router, memory
/// store) living on a [`MemoryHub`].
pub struct TestNode {
    name: String,
    secret: SecretKey,
    router: MessageRouter,
    shutdown_tx: watch::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl TestNode {
    /// Build the node and start its dispatcher and router loop. Does not log in.
    pub fn spawn(hub: &MemoryHub, name: impl Into<String>, private_key: &str) -> Result<Self> {
        let secret = SecretKey::from_hex(private_key)?;
        let (tx, rx) = inbound_channel();
        let transport = hub.transport(secret.clone(), tx);
        let messenger = ChannelMessenger::new(vec![Arc::new(transport)], rx);
        let router = MessageRouter::new(
            secret.clone(),
            Arc::new(MemoryStore::new()),
            messenger.clone(),
            DEFAULT_DEDUP_CAPACITY,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        // router registers its listener before the dispatcher starts pumping
        let router_task = router.spawn(shutdown_rx.clone());
        let dispatcher = messenger.spawn_dispatcher(shutdown_rx);

        Ok(Self {
            name: name.into(),
            secret,
            router,
            shutdown_tx,
            tasks: vec![router_task, dispatcher],
        })
    }

    /// Spawn and log in with `name` as the profile name.
    pub async fn login(hub: &MemoryHub, name: &str, private_key: &str) -> Result<Self> {
        let node = Self::spawn(hub, name, private_key)?;
        let mut profile = Record::new();
        profile.insert("name".to_string(), name.into());
        node.router.login(private_key, profile).await?;
        Ok(node)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key(&self) -> PublicKey {
        self.secret.public()
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Poll `check` until it holds or `timeout` passes.
    pub async fn wait_for<F, Fut>(&self, timeout: Duration, mut check: F) -> Result<()>
    where
        F: FnMut(MessageRouter) -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if check(self.router.clone()).await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("{}: condition not met within {:?}", self.name, timeout);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.router.messenger().shutdown().await;
        for task in self.tasks {
            task.await?;
        }
        Ok(())
    }
}
