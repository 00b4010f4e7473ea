// ABOUTME: OAuth 2.1 data models for registration, authorization, and token exchange
// ABOUTME: Wire request/response structures plus the in-memory pending, code, and refresh records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub use crate::oauth2_client::UpstreamCredentials;

use super::store::Expiring;

/// OAuth 2.0 Client Registration Request (RFC 7591)
#[derive(Debug, Default, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Redirect URIs for authorization code flow
    #[serde(default)]
    pub redirect_uris: Option<Vec<String>>,
    /// Optional client name for display
    pub client_name: Option<String>,
    /// Grant types the client asked for
    pub grant_types: Option<Vec<String>>,
    /// Scopes the client can request
    pub scope: Option<String>,
}

/// OAuth 2.0 Client Registration Response (RFC 7591)
///
/// Every registrant receives the same public client id and no secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    /// Fixed public client identifier
    pub client_id: String,
    /// Registration time (seconds since epoch)
    pub client_id_issued_at: i64,
    /// Redirect URIs accepted for this registration
    pub redirect_uris: Vec<String>,
    /// Grant types allowed
    pub grant_types: Vec<String>,
    /// Response types allowed
    pub response_types: Vec<String>,
    /// Always `none`
    pub token_endpoint_auth_method: String,
    /// Client name echoed back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Scope echoed back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// OAuth 2.1 Authorization Request.
///
/// Fields are optional on the wire so a missing parameter is reported as
/// `invalid_request` rather than as a framework rejection.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct AuthorizeRequest {
    /// Response type (must be `code`)
    pub response_type: Option<String>,
    /// Client identifier
    pub client_id: Option<String>,
    /// Redirect URI for response
    pub redirect_uri: Option<String>,
    /// Requested scopes
    pub scope: Option<String>,
    /// Client state echoed back on redirect
    pub state: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (must be `S256`)
    pub code_challenge_method: Option<String>,
}

/// Query parameters of the identity provider's redirect back to us
#[derive(Debug, Default, Deserialize, Clone)]
pub struct UpstreamCallbackParams {
    /// Upstream authorization code
    pub code: Option<String>,
    /// `{pending_key}:{upstream_state}`
    pub state: Option<String>,
    /// Upstream error code, when the user declined
    pub error: Option<String>,
    /// Upstream error description
    pub error_description: Option<String>,
}

/// OAuth 2.1 Token Request
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct TokenRequest {
    /// Grant type (`authorization_code` or `refresh_token`)
    pub grant_type: Option<String>,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI (must match the authorization request)
    pub redirect_uri: Option<String>,
    /// Client ID
    pub client_id: Option<String>,
    /// PKCE code verifier (RFC 7636, for `authorization_code` grant)
    pub code_verifier: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
    /// Requested scopes
    pub scope: Option<String>,
}

/// OAuth 2.1 Token Response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token (JWT)
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Expires in seconds
    pub expires_in: u64,
    /// Scopes granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Refresh token
    pub refresh_token: String,
}

/// Authorization in flight while the user is at the identity provider
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// Requesting client
    pub client_id: String,
    /// Where to send the code
    pub redirect_uri: String,
    /// PKCE challenge to bind the code to
    pub code_challenge: String,
    /// Always `S256`
    pub code_challenge_method: String,
    /// Client's own state, echoed on the final redirect
    pub original_state: Option<String>,
    /// Requested scope
    pub scope: Option<String>,
    /// Random value that must come back from the identity provider unchanged
    pub upstream_state: String,
    /// Eviction deadline
    pub expires_at: Instant,
}

/// Single-use authorization code bound to a PKCE challenge
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// Client the code was issued to
    pub client_id: String,
    /// Redirect URI the code was delivered to
    pub redirect_uri: String,
    /// PKCE challenge from the authorization request
    pub code_challenge: String,
    /// Stable upstream user id
    pub user_id: String,
    /// Credentials obtained at the callback
    pub upstream_credentials: UpstreamCredentials,
    /// Granted scope
    pub scope: Option<String>,
    /// Expiry deadline
    pub expires_at: Instant,
}

/// Server-side refresh token record
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    /// Stable upstream user id
    pub user_id: String,
    /// Client the token was issued to
    pub client_id: String,
    /// Credentials embedded into refreshed bearer tokens
    pub upstream_credentials: UpstreamCredentials,
    /// Granted scope
    pub scope: Option<String>,
    /// Expiry deadline
    pub expires_at: Instant,
}

impl Expiring for PendingAuthorization {
    fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

impl Expiring for AuthorizationCode {
    fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

impl Expiring for RefreshTokenRecord {
    fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

/// Claims recovered from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedBearer {
    /// Upstream user id
    pub subject: String,
    /// Embedded upstream credentials
    pub upstream_credentials: UpstreamCredentials,
    /// Expiry (seconds since epoch)
    pub expires_at: i64,
    /// Granted scope
    pub scope: Option<String>,
}

const RFC6749_AUTHORIZATION_ERRORS: &str =
    "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1";
const RFC6749_TOKEN_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2";
const RFC6750_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc6750#section-3.1";
const RFC7591_ERRORS: &str = "https://datatracker.ietf.org/doc/html/rfc7591#section-3.2.2";

/// OAuth 2.0 Error Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI for error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    fn build(error: &str, description: &str, uri: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(uri.to_owned()),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::build("invalid_request", description, RFC6749_AUTHORIZATION_ERRORS)
    }

    /// Create an `unsupported_response_type` error
    #[must_use]
    pub fn unsupported_response_type(description: &str) -> Self {
        Self::build(
            "unsupported_response_type",
            description,
            RFC6749_AUTHORIZATION_ERRORS,
        )
    }

    /// Create an `access_denied` error
    #[must_use]
    pub fn access_denied(description: &str) -> Self {
        Self::build("access_denied", description, RFC6749_AUTHORIZATION_ERRORS)
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::build("invalid_grant", description, RFC6749_TOKEN_ERRORS)
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::build(
            "unsupported_grant_type",
            "Grant type not supported",
            RFC6749_TOKEN_ERRORS,
        )
    }

    /// Create an `invalid_token` error (RFC 6750)
    #[must_use]
    pub fn invalid_token(description: &str) -> Self {
        Self::build("invalid_token", description, RFC6750_ERRORS)
    }

    /// Create an `invalid_redirect_uri` error (RFC 7591)
    #[must_use]
    pub fn invalid_redirect_uri(description: &str) -> Self {
        Self::build("invalid_redirect_uri", description, RFC7591_ERRORS)
    }

    /// Create an `invalid_client_metadata` error (RFC 7591)
    #[must_use]
    pub fn invalid_client_metadata(description: &str) -> Self {
        Self::build("invalid_client_metadata", description, RFC7591_ERRORS)
    }

    /// Create a `server_error` error
    #[must_use]
    pub fn server_error(description: &str) -> Self {
        Self {
            error: "server_error".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: None,
        }
    }

    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "invalid_token" => StatusCode::UNAUTHORIZED,
            "access_denied" => StatusCode::FORBIDDEN,
            "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => f.write_str(&self.error),
        }
    }
}

impl std::error::Error for OAuth2Error {}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(axum::http::header::CACHE_CONTROL, "no-store")],
            Json(self),
        )
            .into_response()
    }
}
