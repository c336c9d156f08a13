//! Axum-based HTTP gateway for the accounting engine.
//!
//! Routes:
//! - `POST /report`    ingest a debounced state report
//! - `GET  /stats`     flat session snapshot
//! - `GET  /heartbeat` detector liveness
//! - `POST /reset`     start a new session
//! - `GET  /test`      smoke test

mod handlers;

use crate::config::{Config, ServerConfig};
use crate::session::SessionTracker;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use handlers::{handle_heartbeat, handle_report, handle_reset, handle_stats, handle_test};

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<SessionTracker>,
}

impl AppState {
    pub fn new(tracker: SessionTracker) -> Self {
        Self {
            tracker: Arc::new(tracker),
        }
    }
}

/// Build the router with CORS, body limit and timeout layers
pub fn build_app(state: AppState, server: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(server.cors_max_age_secs));

    Router::new()
        .route("/report", post(handle_report))
        .route("/stats", get(handle_stats))
        .route("/heartbeat", get(handle_heartbeat))
        .route("/reset", post(handle_reset))
        .route("/test", get(handle_test))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(cors)
}

/// Resolve `server.host` (an IP literal or a hostname) to a bind address
pub async fn resolve_bind_addr(server: &ServerConfig) -> Result<SocketAddr> {
    tokio::net::lookup_host((server.host.as_str(), server.port))
        .await
        .with_context(|| format!("failed to resolve bind host {}", server.host))?
        .next()
        .with_context(|| format!("bind host {} resolved to no addresses", server.host))
}

/// Bind and serve until the process receives Ctrl+C
pub async fn run_server(config: &Config) -> Result<()> {
    let addr = resolve_bind_addr(&config.server).await?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_server_with_listener(listener, config).await
}

/// Serve from a pre-bound listener
pub async fn run_server_with_listener(
    listener: tokio::net::TcpListener,
    config: &Config,
) -> Result<()> {
    config.validate()?;
    let local = listener.local_addr()?;
    let state = AppState::new(SessionTracker::new(&config.session));
    let app = build_app(state, &config.server);

    tracing::info!(
        addr = %local,
        penalty_rate_per_second = config.session.penalty_rate_per_second,
        heartbeat_timeout_seconds = config.session.heartbeat_timeout_seconds,
        "server.listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server.stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down gracefully");
}
