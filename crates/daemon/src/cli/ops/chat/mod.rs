use clap::{Args, Subcommand};

pub mod history;
pub mod read;
pub mod send;

use crate::cli::op::Op;
use hexhoot_daemon::http_server::api::v0::chat::{HistoryRequest, ReadRequest, SendRequest};

crate::command_enum! {
    (Send, SendRequest),
    (History, HistoryRequest),
    (Read, ReadRequest),
}

pub type ChatCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Chat {
    #[command(subcommand)]
    pub command: ChatCommand,
}

#[async_trait::async_trait]
impl Op for Chat {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatOpError {
    #[error("API error: {0}")]
    Api(#[from] hexhoot_daemon::http_server::api::client::ApiError),
}
