// ABOUTME: HTTP server assembly and lifecycle for the LearnHub MCP server
// ABOUTME: Merges route groups, applies tracing/CORS/timeout layers, and shuts down gracefully
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Server Lifecycle
//!
//! One listener serves discovery, the OAuth endpoints, the MCP session
//! endpoint, and the health check. On Ctrl-C or SIGTERM the server stops
//! accepting connections, then closes every live session and stops the
//! background sweeps.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::mcp::ServerResources;
use crate::middleware::setup_cors;
use crate::routes::{HealthRoutes, McpRoutes, OAuth2Routes};

/// Upper bound on producing response headers; event streams are not affected
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Build the complete application router
#[must_use]
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config);

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .merge(OAuth2Routes::routes(Arc::clone(resources)))
        .merge(McpRoutes::routes(Arc::clone(resources)))
        .layer(request_timeout())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Slow handlers are answered with 408 instead of holding the connection
fn request_timeout() -> TimeoutLayer {
    TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(REQUEST_TIMEOUT_SECS),
    )
}

/// Serve until a shutdown signal arrives
///
/// # Errors
///
/// Returns an error if the upstream clients cannot be built, the port cannot
/// be bound, or the server fails while running
pub async fn run(config: ServerConfig) -> Result<()> {
    let port = config.http_port;
    let resources = Arc::new(
        ServerResources::from_config(Arc::new(config))
            .context("Failed to initialize server resources")?,
    );
    let pending_sweeper = resources.start_background_tasks();
    let app = build_router(&resources);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {addr}");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    resources.sessions.shutdown().await;
    pending_sweeper.abort();
    info!("Server stopped");

    served.context("HTTP server error")
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
