use axum::extract::{Json, State};
use axum::response::IntoResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::storage::Record;

use super::show::ProfileResponse;
use super::ProfileError;
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize, clap::Args)]
pub struct UpdateRequest {
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub name: Option<String>,

    /// Status line
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub status: Option<String>,

    /// Picture, usually a data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    pub picture: Option<String>,
}

impl UpdateRequest {
    fn into_fields(self) -> Record {
        let mut fields = Record::new();
        for (name, value) in [
            ("name", self.name),
            ("status", self.status),
            ("picture", self.picture),
        ] {
            if let Some(value) = value {
                fields.insert(name.to_string(), Value::String(value));
            }
        }
        fields
    }
}

/// Merge the given fields into the local profile and push it to every friend.
pub async fn handler(
    State(state): State<ServiceState>,
    Json(req): Json<UpdateRequest>,
) -> Result<impl IntoResponse, ProfileError> {
    let profile = state.router().update_profile(req.into_fields()).await?;
    tracing::info!(key = %profile.key, "profile updated");
    Ok((http::StatusCode::OK, Json(ProfileResponse { profile })).into_response())
}

impl ApiRequest for UpdateRequest {
    type Response = ProfileResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let full_url = base_url.join("/api/v0/profile/update").unwrap();
        client.post(full_url).json(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_fields_skips_unset() {
        let req = UpdateRequest {
            name: Some("alice".into()),
            status: None,
            picture: None,
        };
        let fields = req.into_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], "alice");
    }
}
