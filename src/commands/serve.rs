use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{start_api_server, ApiState};
use crate::proxy::CaddyAdmin;

pub async fn run(config_file: Option<&Path>, port: Option<u16>) -> Result<()> {
    let config = super::load_config(config_file)?;
    let port = port.unwrap_or(config.api.port);

    let caddy = CaddyAdmin::new(&config.proxy.admin_url, &config.proxy.server);
    if let Err(e) = caddy.wait_ready(Duration::from_secs(5)).await {
        warn!(error = %e, "proxy admin API not reachable; routes will fail until it is up");
    }

    let orchestrator = super::build_orchestrator(&config)?;
    let state = ApiState {
        orchestrator: Arc::new(orchestrator),
    };

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        eprintln!("\nShutting down...");
        shutdown.cancel();
    });

    info!(port, "starting API server");
    start_api_server(port, state, cancel).await
}
