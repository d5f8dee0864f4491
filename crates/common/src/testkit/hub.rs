use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::channel::Channel;
use crate::crypto::SecretKey;
use crate::envelope::EncryptedEnvelope;
use crate::transport::{open_and_forward, InboundSender, Transport, TransportError, TransportKind};

#[derive(Clone)]
struct Subscriber {
    identity: SecretKey,
    inbound: InboundSender,
}

/// In-process "network": delivers sealed envelopes to every transport
/// subscribed to the target channel.
#[derive(Clone, Default)]
pub struct MemoryHub {
    subscribers: Arc<Mutex<HashMap<Channel, Vec<Subscriber>>>>,
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHub")
            .field("channels", &self.subscribers.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport attached to this hub.
    pub fn transport(&self, identity: SecretKey, inbound: InboundSender) -> MemoryTransport {
        MemoryTransport {
            hub: self.clone(),
            identity,
            inbound,
            subscribed: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    fn deliver(&self, channel: &Channel, bytes: &[u8]) -> usize {
        let subscribers = self
            .subscribers
            .lock()
            .get(channel)
            .cloned()
            .unwrap_or_default();

        subscribers
            .iter()
            .filter(|subscriber| {
                match open_and_forward(bytes, &subscriber.identity, &subscriber.inbound, TransportKind::Memory) {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::debug!(%channel, "memory delivery failed: {}", e);
                        false
                    }
                }
            })
            .count()
    }
}

#[derive(Clone)]
pub struct MemoryTransport {
    hub: MemoryHub,
    identity: SecretKey,
    inbound: InboundSender,
    subscribed: Arc<RwLock<BTreeSet<Channel>>>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("identity", &self.identity.public())
            .field("subscribed", &*self.subscribed.read())
            .finish()
    }
}

impl MemoryTransport {
    pub fn channels(&self) -> BTreeSet<Channel> {
        self.subscribed.read().clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Memory
    }

    async fn subscribe(&self, channel: &Channel) -> Result<(), TransportError> {
        if !self.subscribed.write().insert(channel.clone()) {
            return Ok(());
        }
        self.hub
            .subscribers
            .lock()
            .entry(channel.clone())
            .or_default()
            .push(Subscriber {
                identity: self.identity.clone(),
                inbound: self.inbound.clone(),
            });
        Ok(())
    }

    async fn send(&self, channel: &Channel, payload: &[u8]) -> Result<(), TransportError> {
        let envelope = EncryptedEnvelope::seal(&self.identity, channel, payload)?;
        let bytes = envelope
            .to_vec()
            .map_err(|e| TransportError::MalformedPayload(e.to_string()))?;
        let delivered = self.hub.deliver(channel, &bytes);
        tracing::trace!(%channel, delivered, "sent message (memory)");
        Ok(())
    }

    async fn shutdown(&self) {
        let mut subscribers = self.hub.subscribers.lock();
        for channel in std::mem::take(&mut *self.subscribed.write()) {
            if let Some(list) = subscribers.get_mut(&channel) {
                list.retain(|s| !s.inbound.same_channel(&self.inbound));
            }
        }
    }
}
