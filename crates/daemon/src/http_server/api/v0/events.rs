use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use common::router::RouterEvent;

use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new().route("/events", get(handler)).with_state(state)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, clap::Args)]
pub struct EventsRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    /// Most recent router events, oldest first
    pub events: Vec<RouterEvent>,
}

pub async fn handler(State(state): State<ServiceState>) -> Response {
    let events = state.recent_events();
    (http::StatusCode::OK, Json(EventsResponse { events })).into_response()
}

impl ApiRequest for EventsRequest {
    type Response = EventsResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/events").unwrap();
        client.get(full_url)
    }
}
