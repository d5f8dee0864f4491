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
pub struct HistoryRequest {
    /// Public key of the conversation partner (hex)
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatEntry>,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<HistoryRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let peer = PublicKey::from_hex(&req.key)?;
    let messages = state.router().messages_with(&peer).await?;
    Ok((http::StatusCode::OK, Json(HistoryResponse { messages })).into_response())
}

impl ApiRequest for HistoryRequest {
    type Response = HistoryResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/chat/history").unwrap();
        client.post(full_url).json(&self)
    }
}
