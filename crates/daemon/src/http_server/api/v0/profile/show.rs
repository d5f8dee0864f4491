use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::router::UserProfile;

use super::ProfileError;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize, clap::Args)]
pub struct ShowRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: UserProfile,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Json(_req): Json<ShowRequest>,
) -> Result<impl IntoResponse, ProfileError> {
    let profile = state.router().local_public_profile().await?;
    Ok((http::StatusCode::OK, Json(ProfileResponse { profile })).into_response())
}

impl ApiRequest for ShowRequest {
    type Response = ProfileResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/profile/show").unwrap();
        client.post(full_url).json(&self)
    }
}
