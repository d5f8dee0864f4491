use std::net::SocketAddr;

use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::prelude::{Channel, PeerRecord, TransportKind};

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new().route("/peers", post(handler)).with_state(state)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, clap::Args)]
pub struct PeersRequest {
    /// Probe this address for a HexHoot instance before listing
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub probe: Option<SocketAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeersResponse {
    pub identity: String,
    pub transports: Vec<TransportKind>,
    pub local_port: Option<u16>,
    pub subscribed: Vec<Channel>,
    pub peers: Vec<PeerRecord>,
}

/// Snapshot of the node's network view. The peer list covers the local
/// network transport only; overlay peers are not enumerable.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<PeersRequest>,
) -> Result<impl IntoResponse, PeersError> {
    let local = state.local();

    if let Some(addr) = req.probe {
        let local = local.ok_or(PeersError::LocalDisabled)?;
        local.probe(addr).await;
    }

    let (local_port, peers) = match local {
        Some(local) => (local.port().await, local.directory().all()),
        None => (None, Vec::new()),
    };

    Ok((
        http::StatusCode::OK,
        Json(PeersResponse {
            identity: state.secret().public().to_hex(),
            transports: state.messenger().kinds(),
            local_port,
            subscribed: state.messenger().subscribed().into_iter().collect(),
            peers,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum PeersError {
    #[error("local network transport is disabled")]
    LocalDisabled,
}

impl IntoResponse for PeersError {
    fn into_response(self) -> Response {
        (http::StatusCode::CONFLICT, self.to_string()).into_response()
    }
}

impl ApiRequest for PeersRequest {
    type Response = PeersResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/peers").unwrap();
        client.post(full_url).json(&self)
    }
}
