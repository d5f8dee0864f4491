use hexhoot_daemon::http_server::api::v0::friend::list::{ListRequest, ListResponse};

use super::FriendOpError;

#[async_trait::async_trait]
impl crate::cli::op::Op for ListRequest {
    type Error = FriendOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: ListResponse = client.call(self.clone()).await?;

        if response.friends.is_empty() {
            return Ok("No friends yet".to_string());
        }

        let output = response
            .friends
            .iter()
            .map(|friend| {
                let key = friend.get("key").and_then(|v| v.as_str()).unwrap_or("?");
                let name = friend
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("(no profile yet)");
                let unread = friend.get("isRead").and_then(|v| v.as_bool()) == Some(false);
                format!("{} {}{}", key, name, if unread { " [unread]" } else { "" })
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(output)
    }
}
