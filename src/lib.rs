// ABOUTME: Main library entry point for the LearnHub MCP server
// ABOUTME: OAuth 2.1 authorization server plus streamable MCP sessions over the LearnHub API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # `LearnHub` MCP Server
//!
//! A Model Context Protocol (MCP) server that lets AI assistants manage
//! courses and lessons on the `LearnHub` learning platform on behalf of a
//! signed-in user.
//!
//! ## Architecture
//!
//! - **`oauth2_server`**: OAuth 2.1 authorization server with PKCE that
//!   delegates sign-in to the upstream identity provider and issues signed
//!   bearer tokens carrying the upstream credentials
//! - **`oauth2_client`**: client for the upstream identity provider
//! - **mcp**: session manager, per-session protocol engine, tool registry
//! - **providers**: `LearnHub` REST API client
//! - **routes / middleware**: the axum HTTP surface
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use learnhub_mcp_server::config::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     learnhub_mcp_server::server::run(config).await
//! }
//! ```

/// Environment-driven configuration
pub mod config;

/// Error types re-exported from the core crate
pub mod errors;

/// JSON-RPC 2.0 message types
pub mod jsonrpc;

/// Structured logging setup and application log events
pub mod logging;

/// MCP sessions, protocol engine, and tools
pub mod mcp;

/// HTTP middleware: bearer authentication, CORS, session headers
pub mod middleware;

/// Client for the upstream identity provider
pub mod oauth2_client;

/// OAuth 2.1 authorization server
pub mod oauth2_server;

/// `LearnHub` learning API client
pub mod providers;

/// HTTP route groups
pub mod routes;

/// Router assembly and server lifecycle
pub mod server;

/// Shared utilities
pub mod utils;
