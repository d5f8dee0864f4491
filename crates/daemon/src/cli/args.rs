pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "hexhoot")]
#[command(about = "Encrypted peer-to-peer messaging over the local network and the iroh overlay")]
pub struct Args {
    /// Daemon API URL (defaults to the api_port in config.toml)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the hexhoot config directory (defaults to ~/.hexhoot)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
