use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

use common::crypto::CryptoError;
use common::router::RouterError;

use crate::ServiceState;

pub mod add;
pub mod info;
pub mod list;

pub use add::AddRequest;
pub use info::InfoRequest;
pub use list::ListRequest;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/add", post(add::handler))
        .route("/list", post(list::handler))
        .route("/info", post(info::handler))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum FriendError {
    #[error("Invalid public key: {0}")]
    InvalidKey(#[from] CryptoError),
    #[error("Router error: {0}")]
    Router(#[from] RouterError),
}

impl IntoResponse for FriendError {
    fn into_response(self) -> Response {
        tracing::error!("FRIEND ERROR: {:?}", self);
        match self {
            FriendError::InvalidKey(e) => (
                http::StatusCode::BAD_REQUEST,
                format!("Invalid public key: {}", e),
            )
                .into_response(),
            FriendError::Router(RouterError::NoLocalProfile) => (
                http::StatusCode::PRECONDITION_FAILED,
                "No user is logged in".to_string(),
            )
                .into_response(),
            FriendError::Router(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Router error: {}", e),
            )
                .into_response(),
        }
    }
}
