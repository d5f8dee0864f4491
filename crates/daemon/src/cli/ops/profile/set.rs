use hexhoot_daemon::http_server::api::v0::profile::show::ProfileResponse;
use hexhoot_daemon::http_server::api::v0::profile::UpdateRequest;

use super::{format_profile, ProfileOpError};

#[async_trait::async_trait]
impl crate::cli::op::Op for UpdateRequest {
    type Error = ProfileOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: ProfileResponse = client.call(self.clone()).await?;
        Ok(format!(
            "Profile updated and sent to friends\n{}",
            format_profile(&response.profile)
        ))
    }
}
