use hexhoot_daemon::http_server::api::v0::friend::add::{AddRequest, AddResponse};

use super::FriendOpError;

#[async_trait::async_trait]
impl crate::cli::op::Op for AddRequest {
    type Error = FriendOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: AddResponse = client.call(self.clone()).await?;
        Ok(format!("Friend request sent to {}", response.key))
    }
}
