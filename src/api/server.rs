//! Listener, startup task and graceful shutdown
//!
//! The listener is bound before the agent is initialized, so the
//! introspection endpoints answer while startup is still running. A startup
//! failure shuts the server down and is returned to the caller.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use super::routes::create_router;
use super::state::AppState;
use crate::bootstrap::bootstrap;
use crate::config::Config;
use crate::error::Result;
use crate::mcp::McpClientManager;

/// Bind the configured address and serve until Ctrl-C or a startup failure
///
/// # Errors
///
/// Returns an error if the address cannot be bound, if startup fails, or if
/// the server itself fails.
pub async fn start_server(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    run(listener, config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Serve on `listener`, initializing the agent in the background
///
/// Returns once `shutdown` resolves or startup fails, after in-flight
/// requests finish and MCP sessions are closed.
///
/// # Errors
///
/// Returns the startup error, or an error if the server fails.
pub async fn run(
    listener: TcpListener,
    config: Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config));
    let app = create_router(Arc::clone(&state));

    info!(
        "{} listening on http://{}",
        env!("CARGO_PKG_NAME"),
        listener.local_addr()?
    );

    let (failed_tx, failed_rx) = watch::channel(false);
    let init = tokio::spawn(initialize(config, Arc::clone(&state), failed_tx));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown, failed_rx))
        .await?;

    if !init.is_finished() {
        init.abort();
    }
    let outcome = match init.await {
        Ok(Ok(manager)) => {
            info!("Closing MCP sessions");
            manager.shutdown().await;
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(anyhow::anyhow!("startup task failed: {e}")),
    };

    info!("Shutting down...");
    outcome
}

/// Run startup and publish the context; flag failures on `failed_tx`
async fn initialize(
    config: Config,
    state: Arc<AppState>,
    failed_tx: watch::Sender<bool>,
) -> Result<McpClientManager> {
    let published = match bootstrap(&config).await {
        Ok((context, manager)) => state.publish(context).map(|()| manager),
        Err(e) => Err(e),
    };

    if let Err(e) = &published {
        error!("Failed to initialize agent: {e:#}");
        let _ = failed_tx.send(true);
    }
    published
}

async fn shutdown_signal(
    external: impl Future<Output = ()>,
    mut failed_rx: watch::Receiver<bool>,
) {
    let failed = async move {
        while !*failed_rx.borrow() {
            if failed_rx.changed().await.is_err() {
                // Startup finished without failing; only the external signal remains.
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = external => info!("Shutdown signal received"),
        _ = failed => info!("Stopping server after startup failure"),
    }
}
