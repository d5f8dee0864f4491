use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::router::RouterError;

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/preference", post(handler))
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct PreferenceRequest {
    /// Preference name
    pub name: String,

    /// New value; parsed as JSON, falling back to a plain string
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceResponse {
    pub name: String,
    pub value: Option<Value>,
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Read a preference, writing it first when a value is given.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<PreferenceRequest>,
) -> Result<impl IntoResponse, PreferenceError> {
    if let Some(raw) = &req.value {
        state
            .router()
            .set_preference(&req.name, parse_value(raw))
            .await?;
    }
    let value = state.router().preference(&req.name).await?;

    Ok((
        http::StatusCode::OK,
        Json(PreferenceResponse {
            name: req.name,
            value,
        }),
    )
        .into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("Router error: {0}")]
    Router(#[from] RouterError),
}

impl IntoResponse for PreferenceError {
    fn into_response(self) -> Response {
        tracing::error!("PREFERENCE ERROR: {:?}", self);
        (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            self.to_string(),
        )
            .into_response()
    }
}

impl ApiRequest for PreferenceRequest {
    type Response = PreferenceResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/preference").unwrap();
        client.post(full_url).json(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("{\"a\":1}")["a"], 1);
        assert_eq!(parse_value("dark"), Value::String("dark".into()));
    }
}
