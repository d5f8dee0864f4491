use clap::{Args, Subcommand};

pub mod add;
pub mod info;
pub mod list;

use crate::cli::op::Op;
use hexhoot_daemon::http_server::api::v0::friend::{AddRequest, InfoRequest, ListRequest};

crate::command_enum! {
    (Add, AddRequest),
    (List, ListRequest),
    (Info, InfoRequest),
}

pub type FriendCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Friend {
    #[command(subcommand)]
    pub command: FriendCommand,
}

#[async_trait::async_trait]
impl Op for Friend {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FriendOpError {
    #[error("API error: {0}")]
    Api(#[from] hexhoot_daemon::http_server::api::client::ApiError),
}
