// ABOUTME: Health check route handler for service monitoring
// ABOUTME: Reports liveness and the number of live MCP sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Health check route for monitoring and load balancer probes

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use learnhub_core::constants::endpoints::HEALTH_CHECK;

use crate::mcp::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health check route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        async fn health_handler(
            State(resources): State<Arc<ServerResources>>,
        ) -> Json<serde_json::Value> {
            let status = if resources.sessions.is_shut_down() {
                "shutting_down"
            } else {
                "healthy"
            };
            Json(serde_json::json!({
                "status": status,
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "active_sessions": resources.sessions.active_sessions().await,
            }))
        }

        Router::new()
            .route(HEALTH_CHECK, get(health_handler))
            .with_state(resources)
    }
}
