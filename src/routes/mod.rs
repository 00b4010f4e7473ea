// ABOUTME: Route module organization for LearnHub MCP Server HTTP endpoints
// ABOUTME: Groups discovery/OAuth, MCP session, and health routes by domain
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Route module for the `LearnHub` MCP Server
//!
//! Each domain module contains only route definitions and thin handlers that
//! delegate to the authorization server or the session manager.

/// Health check route
pub mod health;
/// Streamable HTTP MCP session endpoint
pub mod mcp;
/// OAuth 2.1 discovery, registration, authorization, and token routes
pub mod oauth2;

/// Health check route handlers
pub use health::HealthRoutes;
/// MCP session route handlers
pub use mcp::McpRoutes;
/// OAuth 2.1 route handlers
pub use oauth2::OAuth2Routes;
