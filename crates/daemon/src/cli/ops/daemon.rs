use clap::Args;

use hexhoot_daemon::state::AppState;
use hexhoot_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override API server port (default from config)
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Override the preferred local network port (default from config)
    #[arg(long)]
    pub local_port: Option<u16>,

    /// Disable the local network transport
    #[arg(long)]
    pub no_local: bool,

    /// Disable the iroh overlay transport
    #[arg(long)]
    pub no_overlay: bool,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] hexhoot_daemon::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        // Load state from config path (or default ~/.hexhoot)
        let state = AppState::load(ctx.config_path.clone())?;

        // Load the identity key
        let secret = state.load_key()?;

        let local = (state.config.local.enabled && !self.no_local).then(|| {
            let mut local = state.config.local.to_transport_config();
            if let Some(port) = self.local_port {
                local.preferred_port = port;
            }
            local
        });
        let overlay = (state.config.overlay.enabled && !self.no_overlay)
            .then(|| state.config.overlay.to_transport_config());

        let config = ServiceConfig {
            secret,
            local,
            overlay,
            store_path: Some(state.store_path.clone()),
            dedup_capacity: state.config.dedup_capacity,
            api_port: self.api_port.unwrap_or(state.config.api_port),
            log_level: tracing::Level::DEBUG,
            log_dir: self.log_dir.clone(),
        };

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
