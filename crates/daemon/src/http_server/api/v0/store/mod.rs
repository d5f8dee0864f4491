use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

use common::router::RouterError;
use common::storage::StorageError;

use crate::ServiceState;

pub mod export;
pub mod import;

pub use export::ExportRequest;
pub use import::ImportRequest;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/export", post(export::handler))
        .route("/import", post(import::handler))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Router error: {0}")]
    Router(#[from] RouterError),
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        tracing::error!("STORE ERROR: {:?}", self);
        match self {
            StoreError::Router(RouterError::Storage(e @ StorageError::UnsupportedSnapshot(_))) => {
                (http::StatusCode::BAD_REQUEST, format!("Storage error: {}", e)).into_response()
            }
            StoreError::Router(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Router error: {}", e),
            )
                .into_response(),
        }
    }
}
