// ABOUTME: OAuth 2.1 authorization server brokering an upstream identity provider
// ABOUTME: Provides RFC 7591 client registration, PKCE authorization, token exchange, and bearer verification
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// RFC 7591 dynamic client registration
pub mod client_registration;
/// Authorization, callback, and token endpoints
pub mod endpoints;
/// OAuth 2.1 data models and error type
pub mod models;
/// PKCE (RFC 7636) S256 checks
pub mod pkce;
/// Redirect URI validation
pub mod redirect_uri;
/// Expiring in-memory stores
pub mod store;
/// Bearer token issuance and verification
pub mod tokens;

// OAuth 2.1 authorization server implementation

/// OAuth 2.1 authorization server
pub use endpoints::OAuth2AuthorizationServer;
/// Authorization server settings
pub use endpoints::AuthorizationServerConfig;
/// Credential refresh capability used by the session layer
pub use endpoints::CredentialRefresher;

// OAuth 2.1 data models and request/response types

/// Authorization request
pub use models::AuthorizeRequest;
/// Client registration request
pub use models::ClientRegistrationRequest;
/// Client registration response
pub use models::ClientRegistrationResponse;
/// OAuth 2.0 error response
pub use models::OAuth2Error;
/// Token exchange request
pub use models::TokenRequest;
/// Token exchange response
pub use models::TokenResponse;
/// Upstream identity provider callback parameters
pub use models::UpstreamCallbackParams;
/// Upstream credentials embedded in bearer tokens
pub use models::UpstreamCredentials;
/// Verified bearer token claims
pub use models::VerifiedBearer;

/// Redirect URI policy
pub use redirect_uri::RedirectUriPolicy;
/// Bearer token manager
pub use tokens::{BearerClaims, BearerTokenManager};
