//! Best-effort scan of the local /24s for other HexHoot instances.
//!
//! Every failure in here means "no peer at that address" and is only
//! logged at trace/debug level.

use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};

use futures::future::BoxFuture;
use futures::{stream, StreamExt};
use tokio::net::TcpStream;

use super::interfaces::subnet_hosts;
use super::messages::SelfDescription;
use super::LocalNetworkTransport;
use crate::transport::TransportError;

/// Scan every private /24 we sit on and fold in whoever answers.
pub(crate) async fn scan(transport: LocalNetworkTransport) {
    let config = transport.config().clone();
    let endpoint = transport.endpoint();

    let hosts: BTreeSet<IpAddr> = endpoint
        .ips
        .iter()
        .filter_map(|ip| match ip {
            IpAddr::V4(v4) => Some(subnet_hosts(*v4)),
            IpAddr::V6(_) => None,
        })
        .flatten()
        .map(IpAddr::V4)
        .collect();

    let targets: Vec<SocketAddr> = hosts
        .into_iter()
        .flat_map(|ip| config.port_range().map(move |port| SocketAddr::new(ip, port)))
        .filter(|addr| !transport.is_self(addr.ip(), addr.port()))
        .collect();

    tracing::info!(
        candidates = targets.len(),
        "scanning local network for peers"
    );

    let probe_config = &config;
    let alive: Vec<SocketAddr> = stream::iter(targets)
        .map(move |addr| async move { is_listening(addr, probe_config).await.then_some(addr) })
        .buffer_unordered(config.scan_concurrency.max(1))
        .filter_map(futures::future::ready)
        .collect()
        .await;

    tracing::debug!(open = alive.len(), "liveness probe finished");

    stream::iter(alive)
        .for_each_concurrent(config.scan_concurrency.max(1), |addr| {
            probe_peer(transport.clone(), addr)
        })
        .await;

    tracing::info!(peers = transport.directory().len(), "local network scan finished");
}

async fn is_listening(addr: SocketAddr, config: &super::LocalConfig) -> bool {
    matches!(
        tokio::time::timeout(config.probe_timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// `GET /` against `addr`; on a HexHoot answer, fold it in, announce
/// ourselves back and chase any peers it knows that we don't.
pub(crate) fn probe_peer(transport: LocalNetworkTransport, addr: SocketAddr) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let description = match fetch_description(&transport, addr).await {
            Ok(description) => description,
            Err(e) => {
                tracing::trace!(%addr, "no peer: {}", e);
                return;
            }
        };

        if description.application != transport.config().application {
            tracing::trace!(%addr, application = %description.application, "not a hexhoot instance");
            return;
        }

        let candidates = transport.fold_description(addr.ip(), description);

        if let Err(e) = transport.announce_to(addr).await {
            tracing::debug!(%addr, "failed to announce ourselves: {}", e);
        }

        transport.spawn_probes(candidates);
    })
}

async fn fetch_description(
    transport: &LocalNetworkTransport,
    addr: SocketAddr,
) -> Result<SelfDescription, TransportError> {
    let response = transport
        .client()
        .get(format!("http://{}/", addr))
        .timeout(transport.config().http_timeout)
        .send()
        .await
        .map_err(|e| TransportError::NetworkUnreachable(e.to_string()))?
        .error_for_status()
        .map_err(|e| TransportError::NetworkUnreachable(e.to_string()))?;

    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::NetworkUnreachable(e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| TransportError::MalformedPayload(e.to_string()))
}
