use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::prelude::PublicKey;
use common::storage::Record;

use super::FriendError;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct InfoRequest {
    /// Public key to look up (hex)
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub profile: Option<Record>,
}

/// Our own public profile for our key, otherwise whatever `Friends` holds.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<InfoRequest>,
) -> Result<impl IntoResponse, FriendError> {
    let key = PublicKey::from_hex(&req.key)?;
    let profile = state.router().user_info(&key).await?;
    Ok((http::StatusCode::OK, Json(InfoResponse { profile })).into_response())
}

impl ApiRequest for InfoRequest {
    type Response = InfoResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/friend/info").unwrap();
        client.post(full_url).json(&self)
    }
}
