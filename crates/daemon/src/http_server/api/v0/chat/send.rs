use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::prelude::PublicKey;
use common::router::ChatEntry;

use super::ChatError;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct SendRequest {
    /// Public key of the recipient (hex)
    pub key: String,

    /// Message text
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    pub entry: ChatEntry,
}

/// Store the message as sent and hand it to the transports.
///
/// The entry is stored even when no transport could deliver it.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<SendRequest>,
) -> Result<impl IntoResponse, ChatError> {
    if req.message.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    let peer = PublicKey::from_hex(&req.key)?;
    let entry = state.router().send_chat(&peer, &req.message).await?;
    tracing::debug!(peer = %peer, timestamp = entry.message.timestamp, "chat sent");

    Ok((http::StatusCode::OK, Json(SendResponse { entry })).into_response())
}

impl ApiRequest for SendRequest {
    type Response = SendResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/chat/send").unwrap();
        client.post(full_url).json(&self)
    }
}
