use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::crypto::CryptoError;
use common::prelude::{Channel, MessengerError};

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/subscribe", post(handler))
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct SubscribeRequest {
    /// Channel name (hex, optional 0x prefix)
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub channel: Channel,
    /// Every channel this daemon is now subscribed to
    pub subscribed: Vec<Channel>,
}

/// Subscribe on every transport. Succeeds when at least one transport accepted it.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, SubscribeError> {
    let channel = Channel::new(&req.channel)?;
    state.messenger().subscribe(&channel).await?;
    tracing::info!(channel = %channel, "subscribed");

    Ok((
        http::StatusCode::OK,
        Json(SubscribeResponse {
            channel,
            subscribed: state.messenger().subscribed().into_iter().collect(),
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("Invalid channel: {0}")]
    InvalidChannel(#[from] CryptoError),
    #[error("Messenger error: {0}")]
    Messenger(#[from] MessengerError),
}

impl IntoResponse for SubscribeError {
    fn into_response(self) -> Response {
        tracing::error!("SUBSCRIBE ERROR: {:?}", self);
        match self {
            SubscribeError::InvalidChannel(e) => (
                http::StatusCode::BAD_REQUEST,
                format!("Invalid channel: {}", e),
            )
                .into_response(),
            SubscribeError::Messenger(MessengerError::NoTransports) => (
                http::StatusCode::SERVICE_UNAVAILABLE,
                "No transports configured".to_string(),
            )
                .into_response(),
            SubscribeError::Messenger(e) => (
                http::StatusCode::BAD_GATEWAY,
                format!("Messenger error: {}", e),
            )
                .into_response(),
        }
    }
}

impl ApiRequest for SubscribeRequest {
    type Response = SubscribeResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/channel/subscribe").unwrap();
        client.post(full_url).json(&self)
    }
}
