//! Overlay transport over iroh.
//!
//! A channel name doubles as a rendezvous topic: its bytes derive a topic
//! key (see [`topic`]), the subscriber binds an iroh endpoint under that key
//! and publishes it to the mainline DHT through pkarr, and senders dial the
//! topic's node id. One outbound connection (and one unidirectional stream)
//! is cached per channel, so the first send to a channel pays for the dial
//! and later ones reuse it in order.

use std::collections::{BTreeSet, HashMap};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iroh::discovery::pkarr::dht::DhtDiscovery;
use iroh::endpoint::{Connection, SendStream};
use iroh::protocol::Router;
use iroh::Endpoint;
use tokio::sync::{Mutex, OnceCell};

pub mod protocol;
mod slots;
pub mod topic;

use slots::Slots;

pub use protocol::{ChannelProtocol, CHANNEL_ALPN};

use super::{InboundSender, Transport, TransportError, TransportKind};
use crate::channel::Channel;
use crate::crypto::SecretKey;
use crate::envelope::EncryptedEnvelope;

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// UDP port for endpoints, 0 for ephemeral.
    pub bind_port: u16,
    /// How long `subscribe` waits for the topic to be announced.
    pub announce_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            bind_port: 0,
            announce_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

struct Link {
    // kept so the connection outlives the stream handle
    _conn: Connection,
    send: SendStream,
}

struct Inner {
    config: OverlayConfig,
    identity: SecretKey,
    inbound: InboundSender,
    subscribed: Slots<Channel, ()>,
    servers: Mutex<HashMap<Channel, Router>>,
    client: OnceCell<Endpoint>,
    links: Slots<Channel, Arc<Mutex<Link>>>,
}

#[derive(Clone)]
pub struct OverlayTransport {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for OverlayTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayTransport")
            .field("identity", &self.inner.identity.public())
            .field("subscribed", &self.channels())
            .finish()
    }
}

fn overlay_err(e: impl std::fmt::Display) -> TransportError {
    TransportError::Overlay(e.to_string())
}

impl OverlayTransport {
    pub fn new(config: OverlayConfig, identity: SecretKey, inbound: InboundSender) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                identity,
                inbound,
                subscribed: Slots::new(),
                servers: Mutex::new(HashMap::new()),
                client: OnceCell::new(),
                links: Slots::new(),
            }),
        }
    }

    pub fn channels(&self) -> BTreeSet<Channel> {
        self.inner.subscribed.keys().into_iter().collect()
    }

    fn bind_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.inner.config.bind_port)
    }

    /// Join `channel`'s topic. In the server role we announce ourselves and
    /// accept connections on it; a client-only join just records interest.
    ///
    /// Returns once the first join for the channel has finished, including
    /// for callers that raced it.
    pub async fn subscribe_as(&self, channel: &Channel, is_server: bool) -> Result<(), TransportError> {
        if self.inner.subscribed.get(channel).is_some() {
            tracing::debug!(%channel, "already subscribed (overlay)");
            return Ok(());
        }

        self.inner
            .subscribed
            .get_or_try_init(channel, || async {
                if is_server {
                    self.serve_topic(channel).await?;
                }
                tracing::info!(%channel, is_server, "subscribed to channel (overlay)");
                Ok::<_, TransportError>(())
            })
            .await
    }

    async fn serve_topic(&self, channel: &Channel) -> Result<(), TransportError> {
        let topic_key = topic::topic_secret(channel);

        let discovery = DhtDiscovery::builder()
            .secret_key(topic_key.clone())
            .build()
            .map_err(overlay_err)?;

        // ephemeral port unless configured; each topic needs its own socket
        let endpoint = Endpoint::builder()
            .secret_key(topic_key)
            .discovery(discovery)
            .bind_addr_v4(self.bind_addr())
            .bind()
            .await
            .map_err(overlay_err)?;

        let handler = ChannelProtocol::new(self.inner.identity.clone(), self.inner.inbound.clone());
        let router = Router::builder(endpoint.clone())
            .accept(CHANNEL_ALPN, handler)
            .spawn();

        match tokio::time::timeout(self.inner.config.announce_timeout, endpoint.online()).await {
            Ok(()) => tracing::debug!(%channel, node_id = %endpoint.node_id(), "topic announced"),
            Err(_) => tracing::warn!(
                %channel,
                "topic not announced within {:?}, peers may not reach us via overlay yet",
                self.inner.config.announce_timeout
            ),
        }

        self.inner.servers.lock().await.insert(channel.clone(), router);
        Ok(())
    }

    async fn client_endpoint(&self) -> Result<&Endpoint, TransportError> {
        self.inner
            .client
            .get_or_try_init(|| async {
                let discovery = DhtDiscovery::builder()
                    .secret_key(self.inner.identity.0.clone())
                    .build()
                    .map_err(overlay_err)?;
                Endpoint::builder()
                    .secret_key(self.inner.identity.0.clone())
                    .discovery(discovery)
                    .bind_addr_v4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
                    .bind()
                    .await
                    .map_err(overlay_err)
            })
            .await
    }

    /// Cached link for `channel`, dialing its topic if there is none.
    ///
    /// Dials for different channels run independently.
    async fn link_for(&self, channel: &Channel) -> Result<Arc<Mutex<Link>>, TransportError> {
        self.inner
            .links
            .get_or_try_init(channel, || self.dial(channel))
            .await
    }

    async fn dial(&self, channel: &Channel) -> Result<Arc<Mutex<Link>>, TransportError> {
        let endpoint = self.client_endpoint().await?;
        let node_id = topic::topic_node_id(channel);
        tracing::debug!(%channel, %node_id, "dialing overlay topic");

        let conn = tokio::time::timeout(
            self.inner.config.connect_timeout,
            endpoint.connect(node_id, CHANNEL_ALPN),
        )
        .await
        .map_err(|_| {
            TransportError::NetworkUnreachable(format!("overlay connect to {} timed out", channel))
        })?
        .map_err(|e| TransportError::NetworkUnreachable(e.to_string()))?;

        let send = conn
            .open_uni()
            .await
            .map_err(|e| TransportError::NetworkUnreachable(e.to_string()))?;

        Ok(Arc::new(Mutex::new(Link { _conn: conn, send })))
    }

    /// Seal `payload` for the channel owner and write it to the channel's link.
    pub async fn send_to_channel(&self, channel: &Channel, payload: &[u8]) -> Result<(), TransportError> {
        let envelope = EncryptedEnvelope::seal(&self.inner.identity, channel, payload)?;
        let body = envelope
            .to_vec()
            .map_err(|e| TransportError::MalformedPayload(e.to_string()))?;
        let frame = protocol::encode_frame(&body).map_err(overlay_err)?;

        let link = self.link_for(channel).await?;
        let result = link.lock().await.send.write_all(&frame).await;
        if let Err(e) = result {
            self.inner
                .links
                .remove_if(channel, |cached| Arc::ptr_eq(cached, &link));
            return Err(TransportError::NetworkUnreachable(e.to_string()));
        }

        tracing::debug!(%channel, bytes = frame.len(), "sent message (overlay)");
        Ok(())
    }

    pub async fn close(&self) {
        self.inner.links.clear();
        for (channel, router) in self.inner.servers.lock().await.drain() {
            if let Err(e) = router.shutdown().await {
                tracing::warn!(%channel, "overlay router shutdown failed: {}", e);
            }
        }
        if let Some(endpoint) = self.inner.client.get() {
            endpoint.close().await;
        }
    }
}

#[async_trait]
impl Transport for OverlayTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Overlay
    }

    async fn subscribe(&self, channel: &Channel) -> Result<(), TransportError> {
        self.subscribe_as(channel, true).await
    }

    async fn send(&self, channel: &Channel, payload: &[u8]) -> Result<(), TransportError> {
        self.send_to_channel(channel, payload).await
    }

    async fn shutdown(&self) {
        self.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_subscription_is_idempotent() {
        let (tx, _rx) = flume::unbounded();
        let overlay = OverlayTransport::new(
            OverlayConfig::default(),
            SecretKey::generate().unwrap(),
            tx,
        );
        let channel = Channel::new("abcd").unwrap();
        overlay.subscribe_as(&channel, false).await.unwrap();
        overlay.subscribe_as(&channel, false).await.unwrap();
        assert_eq!(overlay.channels().len(), 1);
    }
}
