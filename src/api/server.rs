//! HTTP Server implementation
//!
//! This module provides the HTTP server using Axum framework with:
//! - Configurable host/port binding
//! - Graceful shutdown handling
//! - Per-request timeouts
//! - CORS support
//! - Trace IDs on every request

use crate::api::handlers::AppState;
use crate::api::middleware::trace_id_middleware;
use crate::api::routes::build_api_routes;
use crate::cache::build_profile_cache;
use crate::core::config::ServerConfig;
use crate::core::Config;
use crate::db::manager::DatabaseManager;
use axum::{
    extract::Request,
    http::{HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// HTTP API Server
pub struct ApiServer {
    router: Router,
    config: ServerConfig,
}

impl ApiServer {
    /// Create a new API server with the given configuration and database manager
    pub async fn new(config: Config, db: Arc<DatabaseManager>) -> anyhow::Result<Self> {
        let server_config = config.server.clone();

        let profile_cache = build_profile_cache(&config.cache).await;
        info!(backend = profile_cache.backend(), "Profile cache ready");

        let state = AppState::new(Arc::new(config), db, profile_cache).await?;
        let router = Self::build_router(state);

        Ok(Self {
            router,
            config: server_config,
        })
    }

    /// Build the Axum router with all routes and middleware
    pub fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.server.request_timeout);
        let cors = Self::build_cors_layer(&state.config.security.allowed_origins);

        build_api_routes(state).layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(trace_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(preflight_no_content))
                .layer(cors)
                .layer(TimeoutLayer::new(request_timeout)),
        )
    }

    /// Build CORS layer from allowed origins configuration
    fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
        let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

        if allowed_origins.iter().any(|origin| origin == "*") {
            cors.allow_origin(Any)
        } else {
            let origins: Vec<HeaderValue> = allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                        None
                    }
                })
                .collect();

            cors.allow_origin(origins)
        }
    }

    /// Start the HTTP server and listen for requests
    ///
    /// This method will block until the server is shut down gracefully.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket_addr: SocketAddr = addr.parse()?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            request_timeout = self.config.request_timeout,
            "Starting HTTP server"
        );

        let listener = tokio::net::TcpListener::bind(socket_addr).await?;

        info!(addr = %socket_addr, "HTTP server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server shut down gracefully");

        Ok(())
    }
}

/// Pre-flight answers from the CORS layer carry no body: report them as 204
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Initiating graceful shutdown...");
}
