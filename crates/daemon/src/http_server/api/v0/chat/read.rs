use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::prelude::PublicKey;

use super::ChatError;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct ReadRequest {
    /// Public key of the conversation partner (hex)
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse {
    pub key: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<ReadRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let peer = PublicKey::from_hex(&req.key)?;
    state.router().mark_chat_read(&peer).await?;
    Ok((http::StatusCode::OK, Json(ReadResponse { key: peer.to_hex() })).into_response())
}

impl ApiRequest for ReadRequest {
    type Response = ReadResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/chat/read").unwrap();
        client.post(full_url).json(&self)
    }
}
