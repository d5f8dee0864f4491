use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;

use common::router::RouterError;

use crate::ServiceState;

pub mod show;
pub mod update;

pub use show::ShowRequest;
pub use update::UpdateRequest;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/show", post(show::handler))
        .route("/update", post(update::handler))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Router error: {0}")]
    Router(#[from] RouterError),
}

impl IntoResponse for ProfileError {
    fn into_response(self) -> Response {
        tracing::error!("PROFILE ERROR: {:?}", self);
        match self {
            ProfileError::Router(RouterError::NoLocalProfile) => (
                http::StatusCode::PRECONDITION_FAILED,
                "No user is logged in".to_string(),
            )
                .into_response(),
            ProfileError::Router(e @ RouterError::IdentityMismatch { .. }) => {
                (http::StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
            ProfileError::Router(e) => (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Router error: {}", e),
            )
                .into_response(),
        }
    }
}
