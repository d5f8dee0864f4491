use hexhoot_daemon::http_server::api::v0::friend::info::{InfoRequest, InfoResponse};

use super::FriendOpError;

#[async_trait::async_trait]
impl crate::cli::op::Op for InfoRequest {
    type Error = FriendOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: InfoResponse = client.call(self.clone()).await?;
        match response.profile {
            Some(profile) => Ok(serde_json::to_string_pretty(&profile).unwrap_or_default()),
            None => Ok(format!("No profile stored for {}", self.key)),
        }
    }
}
