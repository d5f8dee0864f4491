use std::net::{IpAddr, SocketAddr};

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::messages::{SelfDescription, SubscribeChannels};
use super::LocalNetworkTransport;
use crate::transport::{open_and_forward, TransportError, TransportKind};

/// Routes every HexHoot instance serves on its local-network port.
pub fn router(transport: LocalNetworkTransport) -> Router {
    Router::new()
        .route("/", get(describe).post(announce))
        .route("/subscribeChannels", post(subscribe_channels))
        .route("/message", post(message))
        .with_state(transport)
}

async fn describe(State(transport): State<LocalNetworkTransport>) -> Json<SelfDescription> {
    Json(transport.self_description())
}

async fn announce(
    State(transport): State<LocalNetworkTransport>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<impl IntoResponse, LocalApiError> {
    let description: SelfDescription = serde_json::from_slice(&body)
        .map_err(|e| LocalApiError::MalformedPayload(e.to_string()))?;
    let remote_ip = verify_source(remote.ip(), &description.ips)?;

    tracing::debug!(remote = %remote_ip, port = description.port, "peer announced itself");
    transport.accept_announcement(remote_ip, description);
    Ok((StatusCode::OK, Json("ok")))
}

async fn subscribe_channels(
    State(transport): State<LocalNetworkTransport>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<impl IntoResponse, LocalApiError> {
    let request: SubscribeChannels = serde_json::from_slice(&body)
        .map_err(|e| LocalApiError::MalformedPayload(e.to_string()))?;
    let remote_ip = verify_source(remote.ip(), &request.ips)?;

    let known = transport
        .directory()
        .add_channels_to_peer(remote_ip, request.channel_names);
    tracing::debug!(remote = %remote_ip, known, "peer subscribed to channels");
    Ok((StatusCode::OK, Json("ok")))
}

async fn message(
    State(transport): State<LocalNetworkTransport>,
    body: Bytes,
) -> Result<impl IntoResponse, LocalApiError> {
    match open_and_forward(
        &body,
        transport.identity(),
        transport.inbound(),
        TransportKind::Local,
    ) {
        Ok(sender) => tracing::debug!(%sender, "message received (local)"),
        Err(TransportError::MalformedPayload(e)) => {
            return Err(LocalApiError::MalformedPayload(e));
        }
        Err(e) => tracing::debug!("dropping local message: {}", e),
    }
    Ok((StatusCode::ACCEPTED, Json("ok")))
}

/// The source address has to be one the sender claims as its own.
pub(crate) fn verify_source(remote: IpAddr, declared: &[IpAddr]) -> Result<IpAddr, LocalApiError> {
    let remote = remote.to_canonical();
    if declared.iter().any(|ip| ip.to_canonical() == remote) {
        Ok(remote)
    } else {
        Err(LocalApiError::IdentityMismatch {
            remote,
            declared: declared.to_vec(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LocalApiError {
    #[error("request from {remote} does not match declared addresses {declared:?}")]
    IdentityMismatch { remote: IpAddr, declared: Vec<IpAddr> },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<LocalApiError> for TransportError {
    fn from(err: LocalApiError) -> Self {
        match err {
            LocalApiError::IdentityMismatch { remote, declared } => {
                TransportError::IdentityMismatch { remote, declared }
            }
            LocalApiError::MalformedPayload(msg) => TransportError::MalformedPayload(msg),
        }
    }
}

impl IntoResponse for LocalApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            LocalApiError::IdentityMismatch { .. } => {
                tracing::warn!("rejecting request: {}", self);
                StatusCode::FORBIDDEN
            }
            LocalApiError::MalformedPayload(_) => {
                tracing::debug!("rejecting request: {}", self);
                StatusCode::BAD_REQUEST
            }
        };
        let msg = serde_json::json!({ "msg": self.to_string() });
        (status, Json(msg)).into_response()
    }
}

/// Bind `ip:preferred`, stepping to the next port while the current one is taken.
pub(crate) async fn bind_with_fallback(
    ip: IpAddr,
    preferred: u16,
    attempts: u16,
) -> Result<(TcpListener, u16), TransportError> {
    let last = preferred.saturating_add(attempts.max(1) - 1);
    let mut port = preferred;
    loop {
        match TcpListener::bind(SocketAddr::new(ip, port)).await {
            Ok(listener) => {
                let bound = listener.local_addr()?.port();
                return Ok((listener, bound));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && port < last => {
                tracing::debug!("port {} is already in use, trying {}", port, port + 1);
                port += 1;
            }
            Err(e) => {
                return Err(TransportError::Bind {
                    first: preferred,
                    last,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// A running listener that can be drained and stopped.
#[derive(Debug)]
pub(crate) struct ServerHandle {
    pub port: u16,
    shutdown_tx: watch::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting, let in-flight handlers finish, then return.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::warn!("local transport server task failed: {}", e);
        }
    }
}

/// Serve on an already-bound listener. Connections queue on the socket as
/// soon as `listener` exists, so the port is live before this returns.
pub(crate) fn spawn(
    listener: TcpListener,
    port: u16,
    transport: LocalNetworkTransport,
) -> ServerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(());
    let app = router(transport).into_make_service_with_connect_info::<SocketAddr>();

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!("local transport server error: {}", e);
        }
    });

    tracing::info!(port, "local transport listening");
    ServerHandle {
        port,
        shutdown_tx,
        task,
    }
}
