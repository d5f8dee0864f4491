use hexhoot_daemon::http_server::api::v0::chat::send::{SendRequest, SendResponse};

use super::ChatOpError;

#[async_trait::async_trait]
impl crate::cli::op::Op for SendRequest {
    type Error = ChatOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: SendResponse = client.call(self.clone()).await?;
        Ok(format!(
            "Sent to {} at {}",
            response.entry.key, response.entry.message.timestamp
        ))
    }
}
