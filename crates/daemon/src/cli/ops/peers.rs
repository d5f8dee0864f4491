use hexhoot_daemon::http_server::api::client::ApiError;
use hexhoot_daemon::http_server::api::v0::peers::{PeersRequest, PeersResponse};

pub type Peers = PeersRequest;

#[derive(Debug, thiserror::Error)]
pub enum PeersOpError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for PeersRequest {
    type Error = PeersOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let response: PeersResponse = client.call(self.clone()).await?;

        let transports = response
            .transports
            .iter()
            .map(|kind| kind.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let mut lines = vec![
            format!("identity:   {}", response.identity),
            format!("transports: {}", transports),
            format!(
                "local port: {}",
                response
                    .local_port
                    .map(|port| port.to_string())
                    .unwrap_or_else(|| "-".to_string())
            ),
            format!("channels:   {}", response.subscribed.len()),
        ];

        if response.peers.is_empty() {
            lines.push("No local peers discovered".to_string());
        } else {
            lines.push(format!("Local peers ({}):", response.peers.len()));
            for peer in &response.peers {
                lines.push(format!(
                    "  {} {} v{} [{} channels]",
                    peer.socket_addr(),
                    peer.application,
                    peer.version,
                    peer.subscribed_channels.len()
                ));
            }
        }

        Ok(lines.join("\n"))
    }
}
