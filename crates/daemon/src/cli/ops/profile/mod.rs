use clap::{Args, Subcommand};

pub mod set;
pub mod show;

use crate::cli::op::Op;
use hexhoot_daemon::http_server::api::v0::profile::{ShowRequest, UpdateRequest};

crate::command_enum! {
    (Show, ShowRequest),
    (Set, UpdateRequest),
}

pub type ProfileCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Profile {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[async_trait::async_trait]
impl Op for Profile {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileOpError {
    #[error("API error: {0}")]
    Api(#[from] hexhoot_daemon::http_server::api::client::ApiError),
}

pub(crate) fn format_profile(profile: &common::router::UserProfile) -> String {
    let mut lines = vec![format!("key:     {}", profile.key)];
    if let Some(name) = &profile.name {
        lines.push(format!("name:    {}", name));
    }
    if let Some(status) = &profile.status {
        lines.push(format!("status:  {}", status));
    }
    if profile.picture.is_some() {
        lines.push("picture: set".to_string());
    }
    lines.join("\n")
}
