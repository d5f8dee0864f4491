use common::router::ChatDirection;
use hexhoot_daemon::http_server::api::v0::chat::history::{HistoryRequest, HistoryResponse};

use super::ChatOpError;

#[async_trait::async_trait]
impl crate::cli::op::Op for HistoryRequest {
    type Error = ChatOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: HistoryResponse = client.call(self.clone()).await?;

        if response.messages.is_empty() {
            return Ok("No messages".to_string());
        }

        let output = response
            .messages
            .iter()
            .map(|entry| {
                let arrow = match entry.message.direction {
                    ChatDirection::Sent => ">",
                    ChatDirection::Received => "<",
                };
                format!("[{}] {} {}", entry.message.timestamp, arrow, entry.message.message)
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}
