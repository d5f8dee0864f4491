use hexhoot_daemon::http_server::api::client::ApiError;
use hexhoot_daemon::http_server::api::v0::preference::{PreferenceRequest, PreferenceResponse};

pub type Preference = PreferenceRequest;

#[derive(Debug, thiserror::Error)]
pub enum PreferenceOpError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for PreferenceRequest {
    type Error = PreferenceOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: PreferenceResponse = client.call(self.clone()).await?;
        Ok(match response.value {
            Some(value) => format!("{} = {}", response.name, value),
            None => format!("{} is not set", response.name),
        })
    }
}
