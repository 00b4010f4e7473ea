// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for OAuth, sessions, and the MCP protocol
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single
//! large file.

/// Error codes and messages for JSON-RPC responses
pub mod errors;
/// OAuth 2.1 authorization server constants
pub mod oauth;
/// MCP protocol and session constants
pub mod protocol;

pub use errors::*;

/// API endpoints
pub mod endpoints {
    /// Health check endpoint
    pub const HEALTH_CHECK: &str = "/health";
    /// Streamable HTTP MCP session endpoint
    pub const MCP: &str = "/mcp";
    /// Authorization server metadata (RFC 8414)
    pub const AUTHORIZATION_SERVER_METADATA: &str = "/.well-known/oauth-authorization-server";
    /// Protected resource metadata (RFC 9728)
    pub const PROTECTED_RESOURCE_METADATA: &str = "/.well-known/oauth-protected-resource";
    /// Dynamic client registration
    pub const OAUTH_REGISTER: &str = "/oauth/register";
    /// Authorization endpoint
    pub const OAUTH_AUTHORIZE: &str = "/oauth/authorize";
    /// Token endpoint
    pub const OAUTH_TOKEN: &str = "/oauth/token";
}

/// Network ports
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8080;
}

/// Environment-level defaults
pub mod defaults {
    /// Default upstream learning API base URL
    pub const LEARNING_API_BASE_URL: &str = "https://api.learnhub.io";
    /// Default provider slug used in the upstream callback path
    pub const PROVIDER_SLUG: &str = "learnhub";
    /// Default upstream scopes
    pub const UPSTREAM_SCOPES: &str = "read,write";
}
