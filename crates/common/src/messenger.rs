//! One subscribe/send surface over every configured transport.
//!
//! A message goes out on all transports at once and reaches the peer over
//! whichever currently has connectivity. Inbound plaintext from all of them
//! lands in one flume channel; a dispatcher task copies every message to
//! each registered listener.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::transport::{InboundReceiver, InboundSender, ReceivedMessage, Transport, TransportKind};

#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("no transports configured")]
    NoTransports,
    #[error("every transport failed for {channel}: {}", errors.join("; "))]
    AllTransportsFailed { channel: Channel, errors: Vec<String> },
}

/// Build the sink transports push decrypted messages into.
pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    flume::unbounded()
}

struct Inner {
    transports: Vec<Arc<dyn Transport>>,
    subscribed: RwLock<BTreeSet<Channel>>,
    inbound: InboundReceiver,
    listeners: Mutex<Vec<flume::Sender<ReceivedMessage>>>,
}

#[derive(Clone)]
pub struct ChannelMessenger {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ChannelMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMessenger")
            .field("transports", &self.kinds())
            .field("subscribed", &*self.inner.subscribed.read())
            .finish()
    }
}

impl ChannelMessenger {
    /// `inbound` must be the receiving half of the sink the transports were
    /// built with (see [`inbound_channel`]).
    pub fn new(transports: Vec<Arc<dyn Transport>>, inbound: InboundReceiver) -> Self {
        Self {
            inner: Arc::new(Inner {
                transports,
                subscribed: RwLock::new(BTreeSet::new()),
                inbound,
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn kinds(&self) -> Vec<TransportKind> {
        self.inner.transports.iter().map(|t| t.kind()).collect()
    }

    pub fn subscribed(&self) -> BTreeSet<Channel> {
        self.inner.subscribed.read().clone()
    }

    pub fn is_subscribed(&self, channel: &Channel) -> bool {
        self.inner.subscribed.read().contains(channel)
    }

    /// Subscribe on every transport. Only fails when all of them do.
    pub async fn subscribe(&self, channel: &Channel) -> Result<(), MessengerError> {
        self.fan_out(channel, |transport| {
            let channel = channel.clone();
            async move { transport.subscribe(&channel).await }
        })
        .await?;
        self.inner.subscribed.write().insert(channel.clone());
        Ok(())
    }

    /// Send on every transport. Only fails when all of them do.
    pub async fn send(&self, channel: &Channel, payload: &[u8]) -> Result<(), MessengerError> {
        self.fan_out(channel, |transport| {
            let channel = channel.clone();
            let payload = payload.to_vec();
            async move { transport.send(&channel, &payload).await }
        })
        .await
    }

    async fn fan_out<F, Fut>(&self, channel: &Channel, op: F) -> Result<(), MessengerError>
    where
        F: Fn(Arc<dyn Transport>) -> Fut,
        Fut: std::future::Future<Output = Result<(), crate::transport::TransportError>>,
    {
        if self.inner.transports.is_empty() {
            return Err(MessengerError::NoTransports);
        }

        let calls = self.inner.transports.iter().map(|transport| {
            let kind = transport.kind();
            let call = op(transport.clone());
            async move { (kind, call.await) }
        });

        let mut errors = Vec::new();
        let mut succeeded = 0usize;
        for (kind, result) in join_all(calls).await {
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    tracing::warn!(transport = %kind, %channel, "transport failed: {}", e);
                    errors.push(format!("{}: {}", kind, e));
                }
            }
        }

        if succeeded == 0 {
            return Err(MessengerError::AllTransportsFailed {
                channel: channel.clone(),
                errors,
            });
        }
        Ok(())
    }

    /// Register a listener. Every inbound message is delivered to every
    /// listener registered at the time it is dispatched.
    pub fn on_message(&self) -> flume::Receiver<ReceivedMessage> {
        let (tx, rx) = flume::unbounded();
        self.inner.listeners.lock().push(tx);
        rx
    }

    fn dispatch(&self, message: ReceivedMessage) {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|listener| listener.send(message.clone()).is_ok());
        if listeners.is_empty() {
            tracing::debug!(sender = %message.sender, "inbound message with no listeners");
        }
    }

    /// Pump the inbound sink into the listeners until shutdown.
    pub fn spawn_dispatcher(&self, mut shutdown_rx: watch::Receiver<()>) -> JoinHandle<()> {
        let messenger = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    received = messenger.inner.inbound.recv_async() => match received {
                        Ok(message) => messenger.dispatch(message),
                        Err(_) => break,
                    },
                }
            }
            tracing::debug!("messenger dispatcher stopped");
        })
    }

    pub async fn shutdown(&self) {
        join_all(self.inner.transports.iter().map(|t| t.shutdown())).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::crypto::SecretKey;
    use crate::testkit::MemoryHub;

    fn key(byte: &str) -> SecretKey {
        SecretKey::from_hex(&byte.repeat(32)).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_twice_tracks_one_channel() {
        let hub = MemoryHub::new();
        let (tx, rx) = inbound_channel();
        let transport = hub.transport(key("11"), tx);
        let messenger = ChannelMessenger::new(vec![Arc::new(transport)], rx);

        let channel = Channel::from(key("11").public());
        messenger.subscribe(&channel).await.unwrap();
        messenger.subscribe(&channel).await.unwrap();

        assert_eq!(messenger.subscribed().len(), 1);
        assert!(messenger.is_subscribed(&channel));
    }

    #[tokio::test]
    async fn test_no_transports() {
        let (_tx, rx) = inbound_channel();
        let messenger = ChannelMessenger::new(Vec::new(), rx);
        let channel = Channel::from(key("11").public());
        assert!(matches!(
            messenger.send(&channel, b"{}").await,
            Err(MessengerError::NoTransports)
        ));
    }

    #[tokio::test]
    async fn test_every_listener_is_notified() {
        let hub = MemoryHub::new();

        let (a_tx, a_rx) = inbound_channel();
        let alice = ChannelMessenger::new(vec![Arc::new(hub.transport(key("11"), a_tx))], a_rx);
        let (b_tx, b_rx) = inbound_channel();
        let bob = ChannelMessenger::new(vec![Arc::new(hub.transport(key("22"), b_tx))], b_rx);

        let (_shutdown_tx, shutdown_rx) = watch::channel(());
        let _dispatcher = bob.spawn_dispatcher(shutdown_rx);
        let first = bob.on_message();
        let second = bob.on_message();

        let bob_channel = Channel::from(key("22").public());
        bob.subscribe(&bob_channel).await.unwrap();
        alice.send(&bob_channel, b"hello").await.unwrap();

        for listener in [first, second] {
            let received = tokio::time::timeout(Duration::from_secs(1), listener.recv_async())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(received.sender, key("11").public());
            assert_eq!(received.payload, b"hello");
        }
    }
}
