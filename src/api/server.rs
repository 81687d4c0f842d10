use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::{api_router, ApiState};

/// Bind `0.0.0.0:<port>` and serve the API until `cancel` fires.
pub async fn start_api_server(
    port: u16,
    state: ApiState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind API server to {}: {}", addr, e))?;
    serve(listener, state, cancel).await
}

pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let local: SocketAddr = listener.local_addr()?;
    let app = api_router(state).layer(CorsLayer::permissive());

    info!(addr = %local, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    info!("API server stopped");
    Ok(())
}
