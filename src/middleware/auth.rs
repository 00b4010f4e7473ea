// ABOUTME: Bearer token middleware guarding the MCP session endpoint
// ABOUTME: Verifies tokens with the authorization server and answers failures with an RFC 9728 challenge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use learnhub_core::constants::endpoints::PROTECTED_RESOURCE_METADATA;
use serde_json::json;

use crate::logging::AppLogger;
use crate::mcp::ServerResources;
use crate::oauth2_server::OAuth2Error;

/// Extract the token from an `Authorization: Bearer <token>` value
#[must_use]
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Require a valid bearer token; the verified claims are placed in request
/// extensions as [`VerifiedBearer`](crate::oauth2_server::VerifiedBearer)
pub async fn require_bearer(
    State(resources): State<Arc<ServerResources>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
        .map(str::to_owned);

    let Some(token) = token else {
        tracing::debug!("Session request without bearer token");
        return challenge(&resources.config.base_url, None);
    };

    match resources.auth_server.verify_bearer(&token) {
        Ok(verified) => {
            tracing::debug!(subject = %verified.subject, "Bearer token verified");
            request.extensions_mut().insert(verified);
            next.run(request).await
        }
        Err(error) => {
            AppLogger::log_security_event(
                "bearer_rejected",
                "low",
                error.error_description.as_deref().unwrap_or(&error.error),
            );
            challenge(&resources.config.base_url, Some(&error))
        }
    }
}

/// 401 pointing the client at the protected resource metadata
#[must_use]
pub fn challenge(issuer: &str, error: Option<&OAuth2Error>) -> Response {
    let mut value = format!(
        r#"Bearer resource_metadata="{}{PROTECTED_RESOURCE_METADATA}""#,
        issuer.trim_end_matches('/')
    );
    if let Some(error) = error {
        value.push_str(&format!(r#", error="{}""#, error.error));
    }

    let body = error.map_or_else(
        || {
            json!({
                "error": "unauthorized",
                "error_description": "Bearer token required",
            })
        },
        |e| json!(e),
    );

    let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    if let Ok(header) = HeaderValue::from_str(&value) {
        response.headers_mut().insert(WWW_AUTHENTICATE, header);
    }
    response
}
