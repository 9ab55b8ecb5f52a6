//! HTTP listener and shutdown handling

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tram_core::Config;

fn listen_addr(config: &Config) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server_port()))
}

/// Serve `app` until the process is asked to stop. In-flight requests are
/// allowed to finish.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = listen_addr(config);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        %addr,
        environment = %config.environment(),
        storage_backend = %config.storage_backend,
        max_upload_mb = config.max_upload_size_bytes() / 1024 / 1024,
        http_concurrency_limit = config.http_concurrency_limit(),
        "TRAM API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let signal = stop_requested().await;
            tracing::info!(signal, "Stop requested, draining connections");
        })
        .await
        .context("HTTP server terminated with an error")?;

    tracing::info!("TRAM API stopped");
    Ok(())
}

/// Name of the first stop signal received. A handler that cannot be
/// installed is logged and never fires.
async fn stop_requested() -> &'static str {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listens_on_all_interfaces_at_configured_port() {
        let mut config = Config::local("postgres://localhost/tram", std::env::temp_dir());
        config.base.server_port = 8123;
        assert_eq!(listen_addr(&config), "0.0.0.0:8123".parse().unwrap());
    }
}
