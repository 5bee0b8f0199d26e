//! Listener setup and graceful shutdown.

use std::net::SocketAddr;

use logfetch_core::config::ValidatedSettings;
use tokio::net::TcpListener;

use crate::routes::{router, AppState};

/// Bind `0.0.0.0:<port>` and serve until Ctrl-C.
pub async fn serve(settings: ValidatedSettings) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        log_dir = %settings.log_dir.display(),
        encoding = %settings.encoding,
        chunk_size = settings.chunk_size,
        "server listening"
    );

    axum::serve(listener, router(AppState::new(settings)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
