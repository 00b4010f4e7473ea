// ABOUTME: OAuth 2.1 authorization server constants and lifetimes
// ABOUTME: Grant types, PKCE parameters, and store expiry windows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! OAuth constants module

/// Fixed public client id handed out by dynamic registration
pub const PUBLIC_CLIENT_ID: &str = "learnhub-mcp-client";

/// Only supported response type
pub const RESPONSE_TYPE_CODE: &str = "code";

/// Authorization code grant
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

/// Refresh token grant
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Only supported PKCE method
pub const PKCE_METHOD_S256: &str = "S256";

/// Token endpoint auth method for public clients
pub const TOKEN_AUTH_METHOD_NONE: &str = "none";

/// Token type returned by the token endpoint
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// PKCE verifier length bounds (RFC 7636 section 4.1)
pub const PKCE_VERIFIER_MIN_LEN: usize = 43;
/// Upper bound for a PKCE verifier
pub const PKCE_VERIFIER_MAX_LEN: usize = 128;

/// Pending authorization lifetime
pub const PENDING_AUTHORIZATION_TTL_SECS: u64 = 600;

/// Authorization code lifetime
pub const AUTHORIZATION_CODE_TTL_SECS: u64 = 600;

/// Refresh token lifetime (30 days)
pub const REFRESH_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default bearer token lifetime
pub const BEARER_TOKEN_TTL_SECS: u64 = 3600;

/// Interval of the eager pending-authorization sweep
pub const PENDING_SWEEP_INTERVAL_SECS: u64 = 60;

/// Random bytes behind pending keys, codes, and refresh tokens
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Separator between the pending key and the upstream state
pub const STATE_SEPARATOR: char = ':';
