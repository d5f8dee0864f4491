use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

use common::crypto::CryptoError;
use common::router::RouterError;

use crate::ServiceState;

pub mod history;
pub mod read;
pub mod send;

pub use history::HistoryRequest;
pub use read::ReadRequest;
pub use send::SendRequest;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/send", post(send::handler))
        .route("/history", post(history::handler))
        .route("/read", post(read::handler))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid public key: {0}")]
    InvalidKey(#[from] CryptoError),
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Router error: {0}")]
    Router(#[from] RouterError),
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        tracing::error!("CHAT ERROR: {:?}", self);
        match self {
            ChatError::InvalidKey(e) => (
                http::StatusCode::BAD_REQUEST,
                format!("Invalid public key: {}", e),
            )
                .into_response(),
            ChatError::EmptyMessage => (
                http::StatusCode::BAD_REQUEST,
                "Message is empty".to_string(),
            )
                .into_response(),
            ChatError::Router(RouterError::NoLocalProfile) => (
                http::StatusCode::PRECONDITION_FAILED,
                "No user is logged in".to_string(),
            )
                .into_response(),
            ChatError::Router(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Router error: {}", e),
            )
                .into_response(),
        }
    }
}
