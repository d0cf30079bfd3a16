//! Process lifecycle: database bootstrap, the HTTP server and the shutdown
//! listener shared by every long-running role.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::api::routes::create_router;
use crate::config::{Environment, Settings};
use crate::db::{AsyncDbPool, establish_async_connection_pool, run_pending_migrations};
use crate::error::AppResult;
use crate::jobs::SystemClock;
use crate::repositories::Repositories;
use crate::state::AppState;

/// Validate database settings, apply migrations when `auto_migrate` is on,
/// and open the pool.
pub async fn connect_database(settings: &Settings) -> AppResult<AsyncDbPool> {
    settings.validate_with_database()?;

    tracing::info!(
        max_connections = %settings.database.max_connections,
        min_connections = %settings.database.min_connections,
        connection_timeout = %settings.database.connection_timeout,
        auto_migrate = %settings.database.auto_migrate,
        "Database configuration loaded"
    );

    if settings.database.auto_migrate {
        let applied = run_pending_migrations(&settings.database.url).await?;
        tracing::info!(count = applied.len(), migrations = ?applied, "Pending migrations applied");
    }

    let pool = establish_async_connection_pool(&settings.database).await?;
    tracing::info!("Database connection pool initialized");
    Ok(pool)
}

/// HTTP server manager
pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Start the server and run until a shutdown signal arrives.
    ///
    /// # Errors
    /// - Database connection pool initialization errors
    /// - Address binding errors
    /// - Server runtime errors
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %Environment::from_env().as_str(),
            "Application starting"
        );

        tracing::info!(
            host = %self.settings.server.host,
            port = %self.settings.server.port,
            request_timeout = %self.settings.server.request_timeout,
            keep_alive_timeout = %self.settings.server.keep_alive_timeout,
            "Server configuration loaded"
        );

        tracing::info!(
            tokens = self.settings.auth.tokens.len(),
            header = %self.settings.auth.header,
            rate_limit_enabled = self.settings.rate_limit.enabled,
            rate_limit_capacity = self.settings.rate_limit.capacity,
            "Auth configuration loaded"
        );

        let pool = connect_database(&self.settings).await?;
        let address = self.settings.server.address();

        let state = AppState::new(
            Repositories::new(pool),
            self.settings,
            Arc::new(SystemClock),
        )?;
        let router = create_router(state);
        tracing::info!("Router configured");

        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;

        tracing::info!(address = %address, "Server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// A token cancelled once [`shutdown_signal`] fires.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });
    token
}
