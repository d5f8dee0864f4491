use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::storage::Snapshot;

use super::StoreError;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportRequest {}

/// Dump every table as one portable snapshot.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(_req): Json<ExportRequest>,
) -> Result<impl IntoResponse, StoreError> {
    let snapshot = state.router().export_snapshot().await?;
    Ok((http::StatusCode::OK, Json(snapshot)).into_response())
}

impl ApiRequest for ExportRequest {
    type Response = Snapshot;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/store/export").unwrap();
        client.post(full_url).json(&self)
    }
}
