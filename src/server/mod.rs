//! Scheduler HTTP server
//!
//! Exposes the engine over REST: job lifecycle events, the distribution
//! report, and the rebalance trigger. The server owns nothing; every
//! request flows through the [`JobEngine`], which keeps the placement
//! index and the durable store consistent.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::engine::JobEngine;
use crate::error::{Error, Result};

pub mod api;

pub use api::{ApiResponse, ErrorResponse, HealthResponse};

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The job engine behind every endpoint
    pub engine: Arc<JobEngine>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<JobEngine>) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Scheduler Server
// ============================================================================

/// HTTP server wrapping the job engine
pub struct SchedulerServer {
    config: ServerConfig,
    state: AppState,
}

impl SchedulerServer {
    /// Create a new scheduler server
    pub fn new(config: ServerConfig, engine: Arc<JobEngine>) -> Self {
        Self {
            config,
            state: AppState::new(engine),
        }
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = api::create_router(self.state.clone());

        // Add CORS layer if enabled
        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        // Add tracing layer if enabled
        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start the server with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.build_router();
        let addr = self.config.bind_address;

        tracing::info!("Starting scheduler server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::other(format!("failed to bind {addr}: {e}")))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| Error::other(format!("server error: {e}")))?;

        tracing::info!("Scheduler server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::LogRunner;
    use crate::storage::MemoryJobRepository;

    fn test_server(config: ServerConfig) -> SchedulerServer {
        let engine = Arc::new(JobEngine::new(
            Arc::new(MemoryJobRepository::new()),
            Arc::new(LogRunner),
            EngineConfig::default(),
        ));
        SchedulerServer::new(config, engine)
    }

    #[test]
    fn test_server_creation() {
        let server = test_server(ServerConfig::default());
        assert_eq!(server.state().engine.bucket().job_count(), 0);
    }

    #[test]
    fn test_build_router_with_layers_disabled() {
        let config = ServerConfig {
            enable_cors: false,
            enable_request_logging: false,
            ..ServerConfig::default()
        };
        let server = test_server(config);

        // Router construction must not panic regardless of layer toggles.
        let _router = server.build_router();
    }
}
