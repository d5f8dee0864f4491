use hexhoot_daemon::http_server::api::client::ApiError;
use hexhoot_daemon::http_server::api::v0::events::{EventsRequest, EventsResponse};

pub type Events = EventsRequest;

#[derive(Debug, thiserror::Error)]
pub enum EventsOpError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for EventsRequest {
    type Error = EventsOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: EventsResponse = client.call(self.clone()).await?;

        if response.events.is_empty() {
            return Ok("No events".to_string());
        }

        let output = response
            .events
            .iter()
            .map(|event| format!("{} via {}: {}", event.sender, event.via, event.kind))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}
