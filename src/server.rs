//! HTTP server setup and lifecycle.
//!
//! Binds the configured address, serves the router for the selected mode
//! and drains in-flight requests on shutdown.

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::Config;

/// Run the showcase HTTP server.
///
/// # Arguments
///
/// * `config` - Server configuration
/// * `router` - Router built for `config.mode`
/// * `shutdown_rx` - Receiver for shutdown signal
///
/// # Returns
///
/// Returns when the server has shut down.
pub async fn run_server(
    config: &Config,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, router, shutdown_rx).await
}

/// Serve `router` on an already-bound listener until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    tracing::info!(address = %listener.local_addr()?, "Starting HTTP server");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            // Wait for shutdown signal
            let _ = shutdown_rx.changed().await;
            tracing::info!("Shutdown signal received, stopping server");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::time::Duration;

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let router = Router::new().route("/health", get(|| async { "ok" }));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = tokio::spawn(serve(listener, router, shutdown_rx));
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server should stop")
            .expect("server task should not panic");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_server_rejects_bad_address() {
        let mut config = Config::test_config(crate::config::Mode::Manual);
        config.host = "not a host".into();
        let (_tx, rx) = watch::channel(false);
        assert!(run_server(&config, Router::new(), rx).await.is_err());
    }
}
