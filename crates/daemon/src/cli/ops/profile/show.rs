use hexhoot_daemon::http_server::api::v0::profile::show::{ProfileResponse, ShowRequest};

use super::{format_profile, ProfileOpError};

#[async_trait::async_trait]
impl crate::cli::op::Op for ShowRequest {
    type Error = ProfileOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: ProfileResponse = client.call(self.clone()).await?;
        Ok(format_profile(&response.profile))
    }
}
