use std::path::PathBuf;

use clap::Args;

use common::storage::Snapshot;
use hexhoot_daemon::http_server::api::client::ApiError;
use hexhoot_daemon::http_server::api::v0::store::import::{ImportRequest, ImportResponse};

#[derive(Args, Debug, Clone)]
pub struct Import {
    /// Snapshot file produced by `hexhoot export`
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Import {
    type Error = ImportError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let bytes = tokio::fs::read(&self.path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;

        let mut client = ctx.client.clone();
        let response: ImportResponse = client.call(ImportRequest { snapshot }).await?;

        let rows = response
            .rows
            .iter()
            .map(|(table, count)| format!("  {}: {}", table, count))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("Imported {}\n{}", self.path.display(), rows))
    }
}
