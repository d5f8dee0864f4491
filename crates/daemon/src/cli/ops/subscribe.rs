use hexhoot_daemon::http_server::api::client::ApiError;
use hexhoot_daemon::http_server::api::v0::channel::{SubscribeRequest, SubscribeResponse};

pub type Subscribe = SubscribeRequest;

#[derive(Debug, thiserror::Error)]
pub enum SubscribeOpError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for SubscribeRequest {
    type Error = SubscribeOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: SubscribeResponse = client.call(self.clone()).await?;
        Ok(format!(
            "Subscribed to {} ({} channels total)",
            response.channel,
            response.subscribed.len()
        ))
    }
}
