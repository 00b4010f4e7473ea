// ABOUTME: OAuth 2.0 dynamic client registration (RFC 7591) for public PKCE clients
// ABOUTME: Validates redirect URIs and hands every registrant the same secretless client id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use chrono::Utc;
use learnhub_core::constants::oauth::{
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, PUBLIC_CLIENT_ID, RESPONSE_TYPE_CODE,
    TOKEN_AUTH_METHOD_NONE,
};

use super::models::{ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Error};
use super::redirect_uri::RedirectUriPolicy;

/// Check if grant type is supported
fn is_supported_grant_type(grant_type: &str) -> bool {
    matches!(grant_type, GRANT_AUTHORIZATION_CODE | GRANT_REFRESH_TOKEN)
}

/// Register a public client.
///
/// There is no per-client state: PKCE is the only proof a client offers, so
/// every registration yields the same client id and no secret.
///
/// # Errors
///
/// Returns `invalid_redirect_uri` or `invalid_client_metadata`
pub fn register_public_client(
    policy: &RedirectUriPolicy,
    request: ClientRegistrationRequest,
) -> Result<ClientRegistrationResponse, OAuth2Error> {
    let redirect_uris = request.redirect_uris.unwrap_or_default();
    if let Some(rejected) = redirect_uris.iter().find(|uri| !policy.is_allowed(uri)) {
        return Err(OAuth2Error::invalid_redirect_uri(&format!(
            "redirect_uri not allowed: {rejected}"
        )));
    }

    let grant_types = match request.grant_types {
        Some(requested) if requested.iter().all(|g| is_supported_grant_type(g)) => requested,
        Some(_) => {
            return Err(OAuth2Error::invalid_client_metadata(
                "Only authorization_code and refresh_token grants are supported",
            ));
        }
        None => vec![
            GRANT_AUTHORIZATION_CODE.to_owned(),
            GRANT_REFRESH_TOKEN.to_owned(),
        ],
    };

    tracing::info!(
        client_name = request.client_name.as_deref().unwrap_or("unnamed"),
        redirect_uri_count = redirect_uris.len(),
        "Registered public OAuth client"
    );

    Ok(ClientRegistrationResponse {
        client_id: PUBLIC_CLIENT_ID.to_owned(),
        client_id_issued_at: Utc::now().timestamp(),
        redirect_uris,
        grant_types,
        response_types: vec![RESPONSE_TYPE_CODE.to_owned()],
        token_endpoint_auth_method: TOKEN_AUTH_METHOD_NONE.to_owned(),
        client_name: request.client_name,
        scope: request.scope,
    })
}
