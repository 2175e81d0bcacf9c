//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use crate::audit::TracingAuditSink;
use crate::config::Config;
use crate::directory::StaticDirectory;
use crate::introspection::{TokenIntrospector, ValidationPolicy};
use crate::{Error, Result};

/// Auth gateway server
pub struct Gateway {
    config: Config,
    state: Arc<AppState>,
}

impl Gateway {
    /// Create a new gateway from configuration.
    pub fn new(config: Config) -> Result<Self> {
        let directory = Arc::new(StaticDirectory::from_config(&config.clients));
        info!(registrations = directory.len(), "Client directory loaded");

        let introspector = TokenIntrospector::new(config.introspection.timeout())?;

        let state = Arc::new(AppState {
            protected_prefix: config.server.protected_prefix.clone(),
            default_endpoint: config.introspection.default_endpoint.clone(),
            directory,
            introspector,
            policy: ValidationPolicy {
                self_audiences: config.introspection.self_audiences.clone(),
                allow_legacy_tokens: config.introspection.allow_legacy_tokens,
            },
            audit: Arc::new(TracingAuditSink),
            cors_origins: config.server.cors_origins.clone(),
        });

        Ok(Self { config, state })
    }

    /// Shared state, for hosts that mount their own tool routes.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the gateway until a shutdown signal arrives.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let app = create_router(Arc::clone(&self.state));
        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("MCP AUTH GATEWAY v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(prefix = %self.config.server.protected_prefix, "Protected prefix");
        info!(
            default_endpoint = %self.config.introspection.default_endpoint,
            timeout_secs = self.config.introspection.timeout_secs,
            "Introspection authority fallback"
        );
        info!(
            active = self.config.active_clients().count(),
            total = self.config.clients.len(),
            "Registered clients"
        );

        if self.config.introspection.allow_legacy_tokens {
            warn!(
                "LEGACY token compatibility enabled - claimless tokens are accepted \
                 on introspection validity alone"
            );
        }
        info!("============================================================");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Server(e.to_string()))?;

        info!("Gateway stopped");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
