//! HTTP server lifecycle — bind, serve, graceful shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::idp::handler::create_router;
use crate::idp::store::spawn_sweeper;
use crate::idp::IdentityProvider;
use crate::{Error, Result};

/// The SSO bridge server.
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a server from validated configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Bind and serve until SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the server loop
    /// fails.
    pub async fn run(self) -> Result<()> {
        let idp = Arc::new(IdentityProvider::new(&self.config));

        // Background sweeper for expired pending grants; stops on shutdown.
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        spawn_sweeper(
            Arc::clone(&idp.store),
            self.config.oidc.sweep_interval,
            shutdown_tx.subscribe(),
        );

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind {addr}: {e}")))?;

        info!(
            addr = %addr,
            issuer = %idp.issuer,
            client_id = %idp.client_id,
            "SSO bridge listening"
        );

        let router = create_router(idp);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(shutdown_tx))
            .await
            .map_err(Error::Io)?;

        info!("Server stopped");
        Ok(())
    }
}

/// Resolve on SIGINT (Ctrl-C) or SIGTERM, then notify background tasks.
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }

    let _ = shutdown_tx.send(());
}
