use hexhoot_daemon::http_server::api::v0::chat::read::{ReadRequest, ReadResponse};

use super::ChatOpError;

#[async_trait::async_trait]
impl crate::cli::op::Op for ReadRequest {
    type Error = ChatOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: ReadResponse = client.call(self.clone()).await?;
        Ok(format!("Marked conversation with {} as read", response.key))
    }
}
