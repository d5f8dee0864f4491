use std::path::PathBuf;

use clap::Args;

use common::storage::Snapshot;
use hexhoot_daemon::http_server::api::client::ApiError;
use hexhoot_daemon::http_server::api::v0::store::ExportRequest;

#[derive(Args, Debug, Clone)]
pub struct Export {
    /// Write the snapshot here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Export {
    type Error = ExportError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut client = ctx.client.clone();
        let snapshot: Snapshot = client.call(ExportRequest::default()).await?;
        let json = serde_json::to_string_pretty(&snapshot)?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, json).await?;
                Ok(format!("Exported store to {}", path.display()))
            }
            None => Ok(json),
        }
    }
}
