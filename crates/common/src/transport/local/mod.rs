//! Local network transport: HTTP gossip between instances on the same LAN.
//!
//! Each instance serves a small HTTP API on the first free port in
//! `[preferred, preferred + attempts)`:
//!
//! - `GET /` returns our [`SelfDescription`] (including every peer we know)
//! - `POST /` accepts a peer's self-description
//! - `POST /subscribeChannels` merges channels into the sender's record
//! - `POST /message` takes a sealed envelope
//!
//! Control posts are only honoured when the TCP source address appears in
//! the sender's own declared `ips`.

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

mod discovery;
pub mod interfaces;
pub mod messages;
pub mod server;

pub use messages::{SelfDescription, SubscribeChannels};
pub use server::{router, LocalApiError};

use super::{InboundSender, Transport, TransportError, TransportKind};
use crate::channel::Channel;
use crate::crypto::SecretKey;
use crate::directory::{PeerDirectory, PeerRecord};
use crate::envelope::EncryptedEnvelope;
use crate::version::APPLICATION;

/// Default first port for the local transport listener.
pub const DEFAULT_PORT: u16 = 43946;
/// Default number of consecutive ports tried before giving up.
pub const DEFAULT_PORT_ATTEMPTS: u16 = 10;
/// Gossiped peers beyond this many queued probes are dropped.
const MAX_PENDING_PROBES: usize = 1024;

#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Address the listener binds to.
    pub bind_ip: IpAddr,
    pub preferred_port: u16,
    pub max_port_attempts: u16,
    /// Scan the local /24s on every (re)initialization.
    pub scan_subnets: bool,
    pub probe_timeout: Duration,
    pub http_timeout: Duration,
    pub scan_concurrency: usize,
    pub watch_interval: Duration,
    /// Minimum spacing between two network-triggered re-inits.
    pub reinit_cooldown: Duration,
    pub application: String,
    pub version: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            preferred_port: DEFAULT_PORT,
            max_port_attempts: DEFAULT_PORT_ATTEMPTS,
            scan_subnets: true,
            probe_timeout: Duration::from_millis(300),
            http_timeout: Duration::from_secs(2),
            scan_concurrency: 256,
            watch_interval: Duration::from_secs(5),
            reinit_cooldown: Duration::from_secs(2),
            application: APPLICATION.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LocalConfig {
    /// Ports peers may be listening on.
    pub fn port_range(&self) -> RangeInclusive<u16> {
        let last = self
            .preferred_port
            .saturating_add(self.max_port_attempts.max(1) - 1);
        self.preferred_port..=last
    }
}

/// Where this instance can currently be reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalEndpoint {
    pub ips: Vec<IpAddr>,
    pub port: u16,
}

#[derive(Debug)]
struct Inner {
    config: LocalConfig,
    identity: SecretKey,
    directory: PeerDirectory,
    channels: RwLock<BTreeSet<Channel>>,
    inbound: InboundSender,
    client: reqwest::Client,
    endpoint: RwLock<LocalEndpoint>,
    // held across the whole re-init so two never overlap
    server: tokio::sync::Mutex<Option<server::ServerHandle>>,
    scan: Mutex<Option<JoinHandle<()>>>,
    // probes of gossiped peers, torn down with the directory they feed
    probes: Mutex<JoinSet<()>>,
    probe_limit: Arc<Semaphore>,
    last_init: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone)]
pub struct LocalNetworkTransport {
    inner: Arc<Inner>,
}

impl LocalNetworkTransport {
    /// Build an idle transport. Nothing is bound until [`initialize`](Self::initialize).
    pub fn new(
        config: LocalConfig,
        identity: SecretKey,
        inbound: InboundSender,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let probe_limit = Arc::new(Semaphore::new(config.scan_concurrency.max(1)));
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                identity,
                directory: PeerDirectory::new(),
                channels: RwLock::new(BTreeSet::new()),
                inbound,
                client,
                endpoint: RwLock::new(LocalEndpoint::default()),
                server: tokio::sync::Mutex::new(None),
                scan: Mutex::new(None),
                probes: Mutex::new(JoinSet::new()),
                probe_limit,
                last_init: Mutex::new(None),
            }),
        })
    }

    /// Build and bring the transport up.
    pub async fn start(
        config: LocalConfig,
        identity: SecretKey,
        inbound: InboundSender,
    ) -> Result<Self, TransportError> {
        let transport = Self::new(config, identity, inbound)?;
        transport.initialize().await?;
        Ok(transport)
    }

    pub fn config(&self) -> &LocalConfig {
        &self.inner.config
    }

    pub fn identity(&self) -> &SecretKey {
        &self.inner.identity
    }

    pub fn directory(&self) -> &PeerDirectory {
        &self.inner.directory
    }

    pub(crate) fn inbound(&self) -> &InboundSender {
        &self.inner.inbound
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.inner.client
    }

    pub fn endpoint(&self) -> LocalEndpoint {
        self.inner.endpoint.read().clone()
    }

    pub fn channels(&self) -> BTreeSet<Channel> {
        self.inner.channels.read().clone()
    }

    /// Port the listener is bound to, if it is running.
    pub async fn port(&self) -> Option<u16> {
        self.inner.server.lock().await.as_ref().map(|s| s.port)
    }

    /// Full (re)initialization: stop the old listener and wait for it to
    /// drain, forget all peers, rebind, then kick off a scan.
    pub async fn initialize(&self) -> Result<u16, TransportError> {
        let mut server = self.inner.server.lock().await;

        if let Some(previous) = server.take() {
            tracing::info!(port = previous.port, "stopping local transport listener");
            previous.shutdown().await;
        }
        self.cancel_discovery().await;
        self.inner.directory.clear();
        *self.inner.last_init.lock() = Some(Instant::now());

        let config = &self.inner.config;
        let (listener, port) = server::bind_with_fallback(
            config.bind_ip,
            config.preferred_port,
            config.max_port_attempts,
        )
        .await?;

        let ips = if config.bind_ip.is_unspecified() {
            interfaces::private_ipv4_addrs()
        } else {
            vec![config.bind_ip]
        };
        *self.inner.endpoint.write() = LocalEndpoint { ips, port };

        *server = Some(server::spawn(listener, port, self.clone()));
        drop(server);

        if config.scan_subnets {
            let handle = tokio::spawn(discovery::scan(self.clone()));
            *self.inner.scan.lock() = Some(handle);
        }

        Ok(port)
    }

    /// Stop the listener and any scan or probe in flight.
    pub async fn stop(&self) {
        if let Some(server) = self.inner.server.lock().await.take() {
            server.shutdown().await;
        }
        self.cancel_discovery().await;
    }

    /// Abort the scan and every gossip probe, and wait until none of them
    /// can touch the directory any more.
    async fn cancel_discovery(&self) {
        let scan = self.inner.scan.lock().take();
        if let Some(scan) = scan {
            scan.abort();
            let _ = scan.await;
        }
        // a probe finishing as it is aborted may still queue more
        loop {
            let mut probes = std::mem::take(&mut *self.inner.probes.lock());
            if probes.is_empty() {
                break;
            }
            probes.shutdown().await;
        }
    }

    /// Probes still queued or running.
    pub fn pending_probes(&self) -> usize {
        self.inner.probes.lock().len()
    }

    /// Probe gossiped peers in the background, at most `scan_concurrency`
    /// at a time.
    pub(crate) fn spawn_probes(&self, candidates: Vec<SocketAddr>) {
        if candidates.is_empty() {
            return;
        }
        let mut probes = self.inner.probes.lock();
        while probes.try_join_next().is_some() {}

        for candidate in candidates {
            if probes.len() >= MAX_PENDING_PROBES {
                tracing::debug!(%candidate, "too many pending probes, dropping gossiped peer");
                continue;
            }
            let transport = self.clone();
            let limit = self.inner.probe_limit.clone();
            probes.spawn(async move {
                let Ok(_permit) = limit.acquire_owned().await else {
                    return;
                };
                discovery::probe_peer(transport, candidate).await;
            });
        }
    }

    pub fn self_description(&self) -> SelfDescription {
        let endpoint = self.endpoint();
        SelfDescription {
            application: self.inner.config.application.clone(),
            version: self.inner.config.version.clone(),
            ip: interfaces::primary_ip(&endpoint.ips),
            ips: endpoint.ips,
            port: endpoint.port,
            hosts: self
                .inner
                .directory
                .all()
                .into_iter()
                .map(|record| (record.ip, record))
                .collect(),
            channels: self.channels(),
        }
    }

    /// Whether `(ip, port)` is this very process.
    pub fn is_self(&self, ip: IpAddr, port: u16) -> bool {
        let endpoint = self.inner.endpoint.read();
        endpoint.port == port && endpoint.ips.iter().any(|own| *own == ip.to_canonical())
    }

    /// Merge a description reached at `reached_at` into the directory.
    ///
    /// Returns the gossiped peers we have not seen yet.
    pub(crate) fn fold_description(
        &self,
        reached_at: IpAddr,
        description: SelfDescription,
    ) -> Vec<SocketAddr> {
        let reached_at = reached_at.to_canonical();
        if description.application != self.inner.config.application
            || self.is_self(reached_at, description.port)
        {
            return Vec::new();
        }

        let is_new = self.inner.directory.upsert(PeerRecord {
            ip: reached_at,
            port: description.port,
            application: description.application,
            version: description.version,
            subscribed_channels: description.channels,
        });
        if is_new {
            tracing::info!(peer = %reached_at, port = description.port, "discovered local peer");
        }

        description
            .hosts
            .into_values()
            .filter(|record| {
                !self.is_self(record.ip, record.port)
                    && record.ip != reached_at
                    && !self.inner.directory.contains(record.ip)
            })
            .map(|record| record.socket_addr())
            .collect()
    }

    /// Handle a verified `POST /` and chase gossiped peers in the background.
    pub(crate) fn accept_announcement(&self, remote: IpAddr, description: SelfDescription) {
        let candidates = self.fold_description(remote, description);
        self.spawn_probes(candidates);
    }

    /// Probe one address directly, outside of a subnet scan.
    pub async fn probe(&self, addr: SocketAddr) {
        discovery::probe_peer(self.clone(), addr).await
    }

    /// `POST /` our self-description to `addr`.
    pub(crate) async fn announce_to(&self, addr: SocketAddr) -> Result<(), TransportError> {
        self.inner
            .client
            .post(format!("http://{}/", addr))
            .json(&self.self_description())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Poll the interface list and re-initialize when it changes.
    pub fn spawn_network_watcher(&self, mut shutdown_rx: watch::Receiver<()>) -> JoinHandle<()> {
        let transport = self.clone();
        tokio::spawn(async move {
            let mut known = interfaces::private_ipv4_addrs();
            let mut ticker = tokio::time::interval(transport.inner.config.watch_interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                let current = interfaces::private_ipv4_addrs();
                if current == known || !transport.cooldown_elapsed() {
                    continue;
                }

                tracing::info!(?current, "network interfaces changed, re-initializing");
                known = current;
                if let Err(e) = transport.initialize().await {
                    tracing::error!("local transport re-initialization failed: {}", e);
                }
            }
        })
    }

    /// Whether a network-triggered re-init may run yet.
    pub fn cooldown_elapsed(&self) -> bool {
        self.inner
            .last_init
            .lock()
            .map_or(true, |last| last.elapsed() >= self.inner.config.reinit_cooldown)
    }
}

#[async_trait]
impl Transport for LocalNetworkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    async fn subscribe(&self, channel: &Channel) -> Result<(), TransportError> {
        if !self.inner.channels.write().insert(channel.clone()) {
            tracing::debug!(%channel, "already subscribed (local)");
            return Ok(());
        }

        let body = SubscribeChannels {
            ips: self.endpoint().ips,
            channel_names: vec![channel.clone()],
        };
        let requests = self.inner.directory.all().into_iter().filter_map(|peer| {
            let url = peer.url()?.join("subscribeChannels").ok()?;
            let request = self.inner.client.post(url).json(&body).send();
            Some(async move { (peer.ip, request.await) })
        });
        for (ip, result) in join_all(requests).await {
            if let Err(e) = result.and_then(|r| r.error_for_status()) {
                tracing::debug!(peer = %ip, "failed to announce subscription: {}", e);
            }
        }

        tracing::info!(%channel, "subscribed to channel (local)");
        Ok(())
    }

    async fn send(&self, channel: &Channel, payload: &[u8]) -> Result<(), TransportError> {
        let envelope = EncryptedEnvelope::seal(&self.inner.identity, channel, payload)?;
        let body = envelope
            .to_vec()
            .map_err(|e| TransportError::MalformedPayload(e.to_string()))?;

        let targets = self.inner.directory.subscribed_to(channel);
        if targets.is_empty() {
            tracing::debug!(%channel, "no local peers subscribed");
            return Ok(());
        }

        let requests = targets.iter().filter_map(|peer| {
            let url = peer.url()?.join("message").ok()?;
            let request = self
                .inner
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send();
            Some(async move { (peer.ip, request.await) })
        });

        let mut delivered = 0usize;
        for (ip, result) in join_all(requests).await {
            match result.and_then(|r| r.error_for_status()) {
                Ok(_) => delivered += 1,
                Err(e) => tracing::debug!(peer = %ip, "failed to deliver message: {}", e),
            }
        }

        tracing::debug!(%channel, delivered, targets = targets.len(), "sent message (local)");
        if delivered == 0 {
            return Err(TransportError::NetworkUnreachable(format!(
                "no local peer accepted the message for {}",
                channel
            )));
        }
        Ok(())
    }

    async fn shutdown(&self) {
        self.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> LocalNetworkTransport {
        let (tx, _rx) = flume::unbounded();
        let config = LocalConfig {
            bind_ip: "127.0.0.1".parse().unwrap(),
            preferred_port: 0,
            scan_subnets: false,
            ..Default::default()
        };
        LocalNetworkTransport::new(config, SecretKey::generate().unwrap(), tx).unwrap()
    }

    fn description(ip: &str, port: u16) -> SelfDescription {
        SelfDescription {
            application: APPLICATION.to_string(),
            version: "0.1.0".to_string(),
            ip: ip.parse().unwrap(),
            ips: vec![ip.parse().unwrap()],
            port,
            hosts: Default::default(),
            channels: Default::default(),
        }
    }

    #[test]
    fn test_port_range() {
        let config = LocalConfig::default();
        assert_eq!(config.port_range(), 43946..=43955);
    }

    #[tokio::test]
    async fn test_fold_description_returns_unknown_gossip() {
        let transport = transport();
        let mut desc = description("10.0.0.2", 43946);
        let known = PeerRecord {
            ip: "10.0.0.3".parse().unwrap(),
            port: 43947,
            application: APPLICATION.to_string(),
            version: "0.1.0".to_string(),
            subscribed_channels: Default::default(),
        };
        desc.hosts.insert(known.ip, known);

        let candidates = transport.fold_description("10.0.0.2".parse().unwrap(), desc);
        assert_eq!(candidates, vec!["10.0.0.3:43947".parse().unwrap()]);
        assert!(transport.directory().contains("10.0.0.2".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_fold_description_ignores_other_applications() {
        let transport = transport();
        let mut desc = description("10.0.0.2", 43946);
        desc.application = "something-else".to_string();
        transport.fold_description("10.0.0.2".parse().unwrap(), desc);
        assert!(transport.directory().is_empty());
    }

    #[tokio::test]
    async fn test_fold_description_filters_self() {
        let transport = transport();
        let port = transport.initialize().await.unwrap();
        transport.fold_description("127.0.0.1".parse().unwrap(), description("127.0.0.1", port));
        assert!(transport.directory().is_empty());
        transport.stop().await;
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let transport = transport();
        let channel = Channel::new("abcd").unwrap();
        transport.subscribe(&channel).await.unwrap();
        transport.subscribe(&channel).await.unwrap();
        assert_eq!(transport.channels().len(), 1);
    }

    #[tokio::test]
    async fn test_send_without_peers_is_ok() {
        let transport = transport();
        let target = SecretKey::generate().unwrap().public();
        transport
            .send(&Channel::from(target), b"{}")
            .await
            .unwrap();
    }
}
