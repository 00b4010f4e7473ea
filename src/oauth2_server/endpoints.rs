// ABOUTME: OAuth 2.1 authorization server brokering PKCE flows against the upstream identity provider
// ABOUTME: Owns pending, code, and refresh stores; issues and verifies bearer tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use learnhub_core::constants::oauth::{
    self as oauth_constants, GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, PKCE_METHOD_S256,
    RESPONSE_TYPE_CODE, STATE_SEPARATOR, TOKEN_TYPE_BEARER,
};
use learnhub_core::errors::{AppError, AppResult, UpstreamError};
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use url::Url;

use super::client_registration;
use super::models::{
    AuthorizationCode, AuthorizeRequest, ClientRegistrationRequest, ClientRegistrationResponse,
    OAuth2Error, PendingAuthorization, RefreshTokenRecord, TokenRequest, TokenResponse,
    UpstreamCallbackParams, UpstreamCredentials, VerifiedBearer,
};
use super::pkce;
use super::redirect_uri::RedirectUriPolicy;
use super::store::ExpiringStore;
use super::tokens::BearerTokenManager;
use crate::config::ServerConfig;
use crate::logging::AppLogger;
use crate::oauth2_client::IdentityProvider;

/// Renews upstream credentials on behalf of the session layer
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Trade an upstream refresh token for fresh credentials. When the
    /// provider does not rotate the refresh token, the old one is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the refresh or is unreachable
    async fn refresh_credentials(&self, refresh_token: &str) -> AppResult<UpstreamCredentials>;
}

/// Authorization server settings
#[derive(Debug, Clone)]
pub struct AuthorizationServerConfig {
    /// Issuer base URL
    pub issuer: String,
    /// Protected resource identifier (audience of bearer tokens)
    pub resource: String,
    /// Redirect URI policy
    pub redirect_policy: RedirectUriPolicy,
    /// Pending authorization lifetime
    pub pending_ttl: Duration,
    /// Authorization code lifetime
    pub code_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
    /// Interval of the eager pending sweep
    pub pending_sweep_interval: Duration,
}

impl AuthorizationServerConfig {
    /// Defaults for `issuer` with the given redirect policy
    #[must_use]
    pub fn new(issuer: &str, redirect_policy: RedirectUriPolicy) -> Self {
        let issuer = issuer.trim_end_matches('/').to_owned();
        Self {
            resource: format!("{issuer}/mcp"),
            issuer,
            redirect_policy,
            pending_ttl: Duration::from_secs(oauth_constants::PENDING_AUTHORIZATION_TTL_SECS),
            code_ttl: Duration::from_secs(oauth_constants::AUTHORIZATION_CODE_TTL_SECS),
            refresh_ttl: Duration::from_secs(oauth_constants::REFRESH_TOKEN_TTL_SECS),
            pending_sweep_interval: Duration::from_secs(
                oauth_constants::PENDING_SWEEP_INTERVAL_SECS,
            ),
        }
    }

    /// Settings derived from the server configuration
    #[must_use]
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self::new(
            &config.base_url,
            RedirectUriPolicy::new(config.redirect_allow_list()),
        )
    }
}

/// OAuth 2.1 authorization server
pub struct OAuth2AuthorizationServer {
    config: AuthorizationServerConfig,
    identity_provider: Arc<dyn IdentityProvider>,
    tokens: BearerTokenManager,
    pending: ExpiringStore<PendingAuthorization>,
    codes: ExpiringStore<AuthorizationCode>,
    refresh_tokens: ExpiringStore<RefreshTokenRecord>,
}

impl OAuth2AuthorizationServer {
    /// Create a server with empty stores
    #[must_use]
    pub fn new(
        config: AuthorizationServerConfig,
        identity_provider: Arc<dyn IdentityProvider>,
        jwt_secret: &[u8],
        bearer_ttl_secs: u64,
    ) -> Self {
        let tokens =
            BearerTokenManager::new(
                jwt_secret,
                &config.issuer,
                &config.resource,
                bearer_ttl_secs,
            );
        Self {
            config,
            identity_provider,
            tokens,
            pending: ExpiringStore::new("pending_authorizations"),
            codes: ExpiringStore::new("authorization_codes"),
            refresh_tokens: ExpiringStore::new("refresh_tokens"),
        }
    }

    /// Server settings
    #[must_use]
    pub const fn config(&self) -> &AuthorizationServerConfig {
        &self.config
    }

    /// Bearer token manager
    #[must_use]
    pub const fn tokens(&self) -> &BearerTokenManager {
        &self.tokens
    }

    /// Register a public client (RFC 7591)
    ///
    /// # Errors
    ///
    /// Returns an error if a redirect URI or grant type is not acceptable
    pub fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        client_registration::register_public_client(&self.config.redirect_policy, request)
    }

    /// Validate an authorization request, park it, and return the upstream
    /// authorization URL the user agent should be sent to.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` or `unsupported_response_type` for a bad
    /// request and `server_error` if randomness or the upstream URL fails
    pub fn begin_authorization(&self, request: AuthorizeRequest) -> Result<String, OAuth2Error> {
        let response_type = required(request.response_type, "response_type")?;
        if response_type != RESPONSE_TYPE_CODE {
            return Err(OAuth2Error::unsupported_response_type(
                "Only response_type=code is supported",
            ));
        }

        let client_id = required(request.client_id, "client_id")?;
        let redirect_uri = required(request.redirect_uri, "redirect_uri")?;
        if !self.config.redirect_policy.is_allowed(&redirect_uri) {
            AppLogger::log_security_event(
                "redirect_uri_rejected",
                "medium",
                &format!("client_id={client_id} redirect_uri={redirect_uri}"),
            );
            return Err(OAuth2Error::invalid_request("redirect_uri is not allowed"));
        }

        let code_challenge = required(request.code_challenge, "code_challenge")?;
        let code_challenge_method =
            required(request.code_challenge_method, "code_challenge_method")?;
        if code_challenge_method != PKCE_METHOD_S256 {
            return Err(OAuth2Error::invalid_request(
                "Only S256 code_challenge_method is supported",
            ));
        }
        pkce::validate_challenge(&code_challenge)?;

        let key = random_token()?;
        let upstream_state = random_token()?;
        let authorization_url = self
            .identity_provider
            .authorization_url(&format!("{key}{STATE_SEPARATOR}{upstream_state}"))
            .map_err(|e| {
                tracing::error!("Failed to build upstream authorization URL: {e}");
                OAuth2Error::server_error("Failed to build upstream authorization URL")
            })?;

        self.pending.insert(
            key,
            PendingAuthorization {
                client_id: client_id.clone(),
                redirect_uri,
                code_challenge,
                code_challenge_method,
                original_state: request.state,
                scope: request.scope,
                upstream_state,
                expires_at: Instant::now() + self.config.pending_ttl,
            },
        );

        AppLogger::log_oauth_event(&client_id, "authorization_started", true, None);
        Ok(authorization_url)
    }

    /// Complete the upstream leg: exchange the upstream code, identify the
    /// user, mint our own authorization code, and return the client redirect.
    ///
    /// # Errors
    ///
    /// Returns `access_denied` when the user declined upstream,
    /// `invalid_request` for an unknown, expired, or mismatched state, and
    /// `server_error` when the identity provider fails
    pub async fn handle_upstream_callback(
        &self,
        params: UpstreamCallbackParams,
    ) -> Result<String, OAuth2Error> {
        let split_state = params
            .state
            .as_deref()
            .and_then(|state| state.split_once(STATE_SEPARATOR));

        if let Some(error) = params.error {
            if let Some((key, _)) = split_state {
                self.pending.take(key, Instant::now());
            }
            let description = params.error_description.unwrap_or(error);
            tracing::info!("Upstream authorization denied: {description}");
            return Err(OAuth2Error::access_denied(&description));
        }

        let (key, upstream_state) = split_state
            .ok_or_else(|| OAuth2Error::invalid_request("Missing or malformed state parameter"))?;

        let pending = self
            .pending
            .take(key, Instant::now())
            .ok_or_else(|| {
                OAuth2Error::invalid_request("Unknown or expired authorization request")
            })?;

        if !bool::from(
            pending
                .upstream_state
                .as_bytes()
                .ct_eq(upstream_state.as_bytes()),
        ) {
            AppLogger::log_security_event(
                "upstream_state_mismatch",
                "high",
                &format!("client_id={}", pending.client_id),
            );
            return Err(OAuth2Error::invalid_request("State parameter mismatch"));
        }

        let upstream_code = required(params.code, "code")?;

        let credentials = self
            .identity_provider
            .exchange_code(&upstream_code)
            .await
            .map_err(|e| upstream_failure("code exchange", &pending.client_id, &e))?;

        let profile = self
            .identity_provider
            .fetch_profile(&credentials.access_token)
            .await
            .map_err(|e| upstream_failure("profile lookup", &pending.client_id, &e))?;

        let code = random_token()?;
        let redirect = client_redirect(
            &pending.redirect_uri,
            &code,
            pending.original_state.as_deref(),
        )?;

        self.codes.insert(
            code,
            AuthorizationCode {
                client_id: pending.client_id.clone(),
                redirect_uri: pending.redirect_uri,
                code_challenge: pending.code_challenge,
                user_id: profile.user_id,
                upstream_credentials: credentials,
                scope: pending.scope,
                expires_at: Instant::now() + self.config.code_ttl,
            },
        );

        AppLogger::log_oauth_event(&pending.client_id, "authorization_code_issued", true, None);
        Ok(redirect)
    }

    /// Token endpoint
    ///
    /// # Errors
    ///
    /// Returns `invalid_request`, `invalid_grant`, or `unsupported_grant_type`
    /// per RFC 6749 section 5.2
    pub fn exchange_token(&self, request: TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let grant_type = request
            .grant_type
            .clone()
            .ok_or_else(|| OAuth2Error::invalid_request("Missing grant_type"))?;

        match grant_type.as_str() {
            GRANT_AUTHORIZATION_CODE => self.handle_authorization_code_grant(request),
            GRANT_REFRESH_TOKEN => self.handle_refresh_token_grant(request),
            _ => Err(OAuth2Error::unsupported_grant_type()),
        }
    }

    fn handle_authorization_code_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let code = required(request.code, "code")?;

        // Single use: the code is gone after this lookup whatever happens next
        let auth_code = self
            .codes
            .take(&code, Instant::now())
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid or expired authorization code"))?;

        if request
            .client_id
            .as_deref()
            .is_some_and(|client_id| client_id != auth_code.client_id)
        {
            return Err(OAuth2Error::invalid_grant(
                "Authorization code was issued to another client",
            ));
        }
        if request
            .redirect_uri
            .as_deref()
            .is_some_and(|redirect_uri| redirect_uri != auth_code.redirect_uri)
        {
            return Err(OAuth2Error::invalid_grant("redirect_uri mismatch"));
        }

        let verifier = request
            .code_verifier
            .ok_or_else(|| OAuth2Error::invalid_grant("code_verifier is required (PKCE)"))?;
        if let Err(e) = pkce::verify(&verifier, &auth_code.code_challenge) {
            tracing::warn!(
                "PKCE verification failed for client {}: {}",
                auth_code.client_id,
                e
            );
            return Err(e);
        }

        let access_token = self.mint_bearer(
            &auth_code.user_id,
            &auth_code.upstream_credentials,
            auth_code.scope.as_deref(),
        )?;

        let refresh_token = random_token()?;
        self.refresh_tokens.insert(
            refresh_token.clone(),
            RefreshTokenRecord {
                user_id: auth_code.user_id,
                client_id: auth_code.client_id.clone(),
                upstream_credentials: auth_code.upstream_credentials,
                scope: auth_code.scope.clone(),
                expires_at: Instant::now() + self.config.refresh_ttl,
            },
        );

        AppLogger::log_oauth_event(&auth_code.client_id, "token_issued", true, None);
        Ok(self.token_response(access_token, refresh_token, auth_code.scope))
    }

    fn handle_refresh_token_grant(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, OAuth2Error> {
        let refresh_token = required(request.refresh_token, "refresh_token")?;

        let record = self
            .refresh_tokens
            .get(&refresh_token, Instant::now())
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid or expired refresh token"))?;

        if request
            .client_id
            .as_deref()
            .is_some_and(|client_id| client_id != record.client_id)
        {
            return Err(OAuth2Error::invalid_grant(
                "Refresh token was issued to another client",
            ));
        }

        let access_token = self.mint_bearer(
            &record.user_id,
            &record.upstream_credentials,
            record.scope.as_deref(),
        )?;

        AppLogger::log_oauth_event(&record.client_id, "token_refreshed", true, None);
        // Not rotated: the same refresh token stays valid until it expires
        Ok(self.token_response(access_token, refresh_token, record.scope))
    }

    fn mint_bearer(
        &self,
        subject: &str,
        credentials: &UpstreamCredentials,
        scope: Option<&str>,
    ) -> Result<String, OAuth2Error> {
        self.tokens.issue(subject, credentials, scope).map_err(|e| {
            tracing::error!("Failed to issue bearer token: {e}");
            OAuth2Error::server_error("Failed to issue access token")
        })
    }

    fn token_response(
        &self,
        access_token: String,
        refresh_token: String,
        scope: Option<String>,
    ) -> TokenResponse {
        TokenResponse {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_owned(),
            expires_in: self.tokens.ttl_secs(),
            scope,
            refresh_token,
        }
    }

    /// Verify a bearer token presented to the protected resource
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` for any signature, audience, issuer, or expiry failure
    pub fn verify_bearer(&self, token: &str) -> Result<VerifiedBearer, OAuth2Error> {
        self.tokens.verify(token)
    }

    /// Renew upstream credentials with the identity provider
    ///
    /// # Errors
    ///
    /// Returns the classified upstream failure; nothing is retried
    pub async fn refresh_upstream_credentials(
        &self,
        refresh_token: &str,
    ) -> AppResult<UpstreamCredentials> {
        let mut fresh = self
            .identity_provider
            .refresh(refresh_token)
            .await
            .map_err(|e| {
                tracing::warn!("Upstream credential refresh failed: {e}");
                AppError::from(e)
            })?;

        if fresh.refresh_token.is_none() {
            fresh.refresh_token = Some(refresh_token.to_owned());
        }

        // Refresh records keep handing out current credentials
        let updated = self.refresh_tokens.update_matching(
            |record| record.upstream_credentials.refresh_token.as_deref() == Some(refresh_token),
            |record| record.upstream_credentials = fresh.clone(),
        );
        tracing::debug!(updated, "Upstream credentials refreshed");
        Ok(fresh)
    }

    /// Drop expired pending authorizations now
    pub fn purge_expired_pending(&self) -> usize {
        self.pending.purge_expired(Instant::now())
    }

    /// Number of pending authorizations, including expired ones not yet swept
    #[must_use]
    pub fn pending_authorization_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a pending authorization is parked under `key`
    #[must_use]
    pub fn has_pending_authorization(&self, key: &str) -> bool {
        self.pending.contains(key)
    }

    /// Spawn the eager pending-authorization sweep
    #[must_use]
    pub fn spawn_pending_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(server.config.pending_sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                server.purge_expired_pending();
            }
        })
    }
}

#[async_trait]
impl CredentialRefresher for OAuth2AuthorizationServer {
    async fn refresh_credentials(&self, refresh_token: &str) -> AppResult<UpstreamCredentials> {
        self.refresh_upstream_credentials(refresh_token).await
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, OAuth2Error> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuth2Error::invalid_request(&format!("Missing {name} parameter")))
}

fn upstream_failure(stage: &str, client_id: &str, error: &UpstreamError) -> OAuth2Error {
    match error {
        UpstreamError::Rejected { status, .. } => {
            tracing::error!(
                "Upstream {stage} rejected for client_id={client_id} (HTTP {status}): {error}"
            );
        }
        UpstreamError::Network { .. } => {
            tracing::error!("Upstream {stage} unreachable for client_id={client_id}: {error}");
        }
        UpstreamError::Decode { .. } => {
            tracing::error!(
                "Upstream {stage} returned an unusable response for client_id={client_id}: {error}"
            );
        }
    }
    AppLogger::log_oauth_event(client_id, stage, false, Some(&error.to_string()));
    OAuth2Error::server_error(&format!("Identity provider {stage} failed"))
}

fn client_redirect(
    redirect_uri: &str,
    code: &str,
    state: Option<&str>,
) -> Result<String, OAuth2Error> {
    let mut url = Url::parse(redirect_uri).map_err(|e| {
        tracing::error!("Stored redirect_uri does not parse: {e}");
        OAuth2Error::server_error("Invalid redirect_uri")
    })?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("code", code);
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Ok(url.to_string())
}

/// 256-bit random value, base64url without padding
fn random_token() -> Result<String, OAuth2Error> {
    let mut bytes = [0u8; oauth_constants::OPAQUE_TOKEN_BYTES];
    SystemRandom::new().fill(&mut bytes).map_err(|e| {
        tracing::error!("CRITICAL: SystemRandom failed - cannot generate secure random bytes: {e}");
        OAuth2Error::server_error("System RNG failure")
    })?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
