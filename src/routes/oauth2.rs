// ABOUTME: OAuth 2.1 server route handlers for RFC-compliant authorization server endpoints
// ABOUTME: Discovery metadata, client registration, authorize, upstream callback, and token exchange
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! OAuth 2.1 server routes for authorization server functionality

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use learnhub_core::constants::endpoints::{
    AUTHORIZATION_SERVER_METADATA, OAUTH_AUTHORIZE, OAUTH_REGISTER, OAUTH_TOKEN,
    PROTECTED_RESOURCE_METADATA,
};
use learnhub_core::constants::oauth::{
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, PKCE_METHOD_S256, RESPONSE_TYPE_CODE,
    TOKEN_AUTH_METHOD_NONE,
};
use learnhub_core::errors::AppError;
use serde_json::json;

use crate::mcp::ServerResources;
use crate::oauth2_server::{
    AuthorizeRequest, ClientRegistrationRequest, OAuth2Error, TokenRequest,
    UpstreamCallbackParams,
};

/// `OAuth2` routes implementation
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create all `OAuth2` routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                AUTHORIZATION_SERVER_METADATA,
                get(Self::handle_authorization_server_metadata),
            )
            .route(
                PROTECTED_RESOURCE_METADATA,
                get(Self::handle_protected_resource_metadata),
            )
            .route(
                &format!("{PROTECTED_RESOURCE_METADATA}/mcp"),
                get(Self::handle_protected_resource_metadata),
            )
            .route(OAUTH_REGISTER, post(Self::handle_register))
            .route(OAUTH_AUTHORIZE, get(Self::handle_authorize))
            .route("/oauth/:provider/callback", get(Self::handle_callback))
            .route(OAUTH_TOKEN, post(Self::handle_token))
            .with_state(resources)
    }

    /// Authorization server metadata (RFC 8414)
    async fn handle_authorization_server_metadata(
        State(resources): State<Arc<ServerResources>>,
    ) -> Json<serde_json::Value> {
        let issuer = &resources.auth_server.config().issuer;
        Json(json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}{OAUTH_AUTHORIZE}"),
            "token_endpoint": format!("{issuer}{OAUTH_TOKEN}"),
            "registration_endpoint": format!("{issuer}{OAUTH_REGISTER}"),
            "response_types_supported": [RESPONSE_TYPE_CODE],
            "response_modes_supported": ["query"],
            "grant_types_supported": [GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN],
            "code_challenge_methods_supported": [PKCE_METHOD_S256],
            "token_endpoint_auth_methods_supported": [TOKEN_AUTH_METHOD_NONE],
            "scopes_supported": resources.config.identity_provider.scopes,
        }))
    }

    /// Protected resource metadata (RFC 9728)
    async fn handle_protected_resource_metadata(
        State(resources): State<Arc<ServerResources>>,
    ) -> Json<serde_json::Value> {
        let config = resources.auth_server.config();
        Json(json!({
            "resource": config.resource,
            "authorization_servers": [config.issuer],
            "bearer_methods_supported": ["header"],
            "resource_name": "LearnHub MCP Server",
        }))
    }

    /// Handle client registration (POST /oauth/register)
    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        body: Bytes,
    ) -> Result<Response, OAuth2Error> {
        let request: ClientRegistrationRequest = if body.iter().all(u8::is_ascii_whitespace) {
            ClientRegistrationRequest::default()
        } else {
            serde_json::from_slice(&body).map_err(|e| {
                OAuth2Error::invalid_client_metadata(&format!("Invalid registration body: {e}"))
            })?
        };

        let response = resources.auth_server.register_client(request)?;
        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Handle authorization request (GET /oauth/authorize)
    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        Query(request): Query<AuthorizeRequest>,
    ) -> Result<Response, OAuth2Error> {
        let upstream_url = resources.auth_server.begin_authorization(request)?;
        Ok(found(&upstream_url))
    }

    /// Handle the identity provider redirect (GET /oauth/:provider/callback)
    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        Path(provider): Path<String>,
        Query(params): Query<UpstreamCallbackParams>,
    ) -> Result<Response, AppError> {
        if provider != resources.config.identity_provider.provider {
            return Err(AppError::not_found(format!("OAuth provider '{provider}'")));
        }

        match resources.auth_server.handle_upstream_callback(params).await {
            Ok(client_redirect) => Ok(found(&client_redirect)),
            Err(error) => Ok(error.into_response()),
        }
    }

    /// Handle token exchange (POST /oauth/token)
    async fn handle_token(
        State(resources): State<Arc<ServerResources>>,
        form: Result<Form<TokenRequest>, FormRejection>,
    ) -> Result<Response, OAuth2Error> {
        let Form(request) = form.map_err(|e| {
            OAuth2Error::invalid_request(&format!("Token request must be form-encoded: {e}"))
        })?;

        let response = resources.auth_server.exchange_token(request)?;
        Ok((
            StatusCode::OK,
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(response),
        )
            .into_response())
    }
}

/// 302 redirect
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}
