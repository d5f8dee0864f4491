use clap::Args;

use hexhoot_daemon::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health check failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        lines.push("Config:".to_string());
        match AppState::load(ctx.config_path.clone()) {
            Ok(state) => {
                lines.push(format!("  directory:   {}", state.hexhoot_dir.display()));
                lines.push("  config.toml: OK".to_string());
                lines.push("  key.pem:     OK".to_string());
                let store = if state.store_path.exists() {
                    "OK"
                } else {
                    "not created yet"
                };
                lines.push(format!("  store:       {}", store));
                lines.push(format!("  api_port:    {}", state.config.api_port));
                lines.push(format!(
                    "  local:       {}",
                    if state.config.local.enabled {
                        format!("enabled (port {})", state.config.local.preferred_port)
                    } else {
                        "disabled".to_string()
                    }
                ));
                lines.push(format!(
                    "  overlay:     {}",
                    if state.config.overlay.enabled {
                        "enabled"
                    } else {
                        "disabled"
                    }
                ));
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
            }
        }

        lines.push(String::new());
        lines.push(format!("Daemon ({}):", ctx.client.base_url()));

        for probe in ["livez", "readyz"] {
            let line = match ctx.client.probe(probe).await {
                Ok(status) if status.is_success() => format!("  {:<7} OK", probe),
                Ok(status) => format!("  {:<7} UNHEALTHY ({})", probe, status),
                Err(_) => format!("  {:<7} NOT REACHABLE", probe),
            };
            lines.push(line);
        }

        Ok(lines.join("\n"))
    }
}
