use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::prelude::PublicKey;

use super::FriendError;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct AddRequest {
    /// Public key of the user to befriend (hex)
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddResponse {
    pub key: String,
}

/// Store the friend and send them a friend request carrying our profile.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<AddRequest>,
) -> Result<impl IntoResponse, FriendError> {
    let peer = PublicKey::from_hex(&req.key)?;
    state.router().send_friend_request(&peer).await?;
    tracing::info!(peer = %peer, "friend request sent");

    Ok((
        http::StatusCode::OK,
        Json(AddResponse {
            key: peer.to_hex(),
        }),
    )
        .into_response())
}

impl ApiRequest for AddRequest {
    type Response = AddResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/friend/add").unwrap();
        client.post(full_url).json(&self)
    }
}
