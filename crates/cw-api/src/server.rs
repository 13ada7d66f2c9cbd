//! API server implementation.

use crate::routes;
use crate::state::AppState;
use axum::Router;
use chrono::Utc;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// How often the correlator sweeps out aged windows.
    pub sweep_interval: Duration,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Creates a new API server.
    pub fn new(state: AppState, config: ApiServerConfig) -> Self {
        Self { config, state }
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        routes::health::init_start_time();
        routes::create_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Runs the server until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let app = self.router();
        let addr = self.config.bind_address;

        let sweeper = tokio::spawn(sweep_loop(
            self.state.clone(),
            self.config.sweep_interval,
        ));

        info!("starting API server on {}", addr);
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        sweeper.abort();
        info!("API server shut down gracefully");
        Ok(())
    }
}

/// Periodically ages out correlation windows so groups close even when a
/// category goes quiet.
async fn sweep_loop(state: AppState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let closed = state.correlator.sweep(Utc::now()).await;
        for group in &closed {
            info!(group_id = %group.id, category = %group.category, "correlation group closed");
        }
        let open = state.correlator.open_groups().await.len();
        metrics::gauge!("crosswatch_correlation_groups_open").set(open as f64);
    }
}

/// Default shutdown signal handler.
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
