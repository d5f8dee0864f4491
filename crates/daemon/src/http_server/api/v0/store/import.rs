use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::storage::{Snapshot, Table};

use super::StoreError;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    /// Rows per table after the import
    pub rows: Vec<(Table, usize)>,
}

/// Replace every table with the snapshot and resubscribe our own channel.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<ImportRequest>,
) -> Result<impl IntoResponse, StoreError> {
    let rows = Table::ALL
        .iter()
        .map(|table| {
            let count = req.snapshot.tables.get(table).map(Vec::len).unwrap_or(0);
            (*table, count)
        })
        .collect();
    state.router().import_snapshot(req.snapshot).await?;
    tracing::info!(?rows, "store imported");

    Ok((http::StatusCode::OK, Json(ImportResponse { rows })).into_response())
}

impl ApiRequest for ImportRequest {
    type Response = ImportResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/store/import").unwrap();
        client.post(full_url).json(&self)
    }
}
