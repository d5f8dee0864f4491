// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{
    args::Args, op::Op, Chat, Daemon, Events, Export, Friend, Health, Import, Init, Keygen, Peers,
    Preference, Profile, Subscribe, Version,
};

command_enum! {
    (Init, Init),
    (Daemon, Daemon),
    (Keygen, Keygen),
    (Health, Health),
    (Version, Version),
    (Profile, Profile),
    (Friend, Friend),
    (Chat, Chat),
    (Subscribe, Subscribe),
    (Peers, Peers),
    (Pref, Preference),
    (Events, Events),
    (Export, Export),
    (Import, Import),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Resolve remote URL: explicit flag > config api_port > default
    let remote = match cli::op::resolve_remote(args.remote, args.config_path.clone()) {
        Ok(remote) => remote,
        Err(e) => {
            eprintln!("Error: Invalid daemon URL: {}", e);
            std::process::exit(1);
        }
    };

    // Build context - always has API client initialized
    let ctx = match cli::op::OpContext::new(remote, args.config_path) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
