//! Relay server listener
//!
//! Binds the HTTP listener, serves the router and coordinates shutdown of
//! open event streams.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::hub::Hub;
use crate::relay::RelayService;
use crate::server::config::RelayConfig;
use crate::server::routes::{router, AppState};

/// HTTP relay server
pub struct RelayServer {
    config: RelayConfig,
    relay: Arc<RelayService>,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// Create a server with in-memory stores
    pub fn new(config: RelayConfig) -> Self {
        let hub = Arc::new(Hub::with_config(config.hub_config()));
        let relay = Arc::new(RelayService::in_memory(hub, config.max_events_per_room));
        Self::with_relay(config, relay)
    }

    /// Create a server around an existing relay service
    pub fn with_relay(config: RelayConfig, relay: Arc<RelayService>) -> Self {
        Self {
            config,
            relay,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get a reference to the relay service
    pub fn relay(&self) -> &Arc<RelayService> {
        &self.relay
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Arc<Hub> {
        self.relay.hub()
    }

    /// Token cancelled when the server shuts down; parent of every listener
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Build the router for this server
    pub fn router(&self) -> Router {
        let mut state = AppState::new(
            Arc::clone(&self.relay),
            self.shutdown.clone(),
            self.config.secret_key.clone(),
        );
        if let Some(limiter) = self.config.rate_limiter() {
            state = state.with_rate_limiter(limiter);
        }
        router(state)
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Open event streams are cancelled when shutdown begins so that the
    /// graceful drain does not wait on them forever.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: SocketAddr = listener.local_addr()?;
        tracing::info!(addr = %local, "Relay server listening");

        if self.config.secret_key.is_none() {
            tracing::warn!("No secret key configured, push endpoint is unauthenticated");
        }

        let stats_handle = self.spawn_stats_task();

        let token = self.shutdown.clone();
        let signal = async move {
            tokio::select! {
                _ = shutdown => tracing::info!("Shutdown signal received"),
                _ = token.cancelled() => {}
            }
            token.cancel();
        };

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await;

        if let Some(handle) = stats_handle {
            handle.abort();
        }

        tracing::info!("Relay server stopped");
        Ok(result?)
    }

    /// Request shutdown of a running server
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Spawn a task that periodically logs hub statistics
    fn spawn_stats_task(&self) -> Option<JoinHandle<()>> {
        let period = self.config.stats_interval()?;
        let hub = Arc::clone(self.relay.hub());
        let token = self.shutdown.clone();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }

                let stats = hub.stats().await;
                tracing::info!(
                    rooms = stats.rooms,
                    connections = stats.connections,
                    published = stats.messages_published,
                    deliveries = stats.deliveries,
                    skipped = stats.skipped,
                    "Hub stats"
                );
            }
        }))
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        Ok(self.config.bind_addr()?)
    }
}
