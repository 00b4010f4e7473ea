// ABOUTME: OAuth2 client for the upstream LearnHub identity provider
// ABOUTME: Authorization URL building, code exchange, profile lookup, and token refresh
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::fmt;

use async_trait::async_trait;
use learnhub_core::errors::UpstreamError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::IdentityProviderConfig;
use crate::utils::http_client::oauth_client;

const SERVICE: &str = "identity provider";

/// Credentials issued by the upstream identity provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamCredentials {
    /// Upstream access token
    pub access_token: String,
    /// Upstream refresh token, when the provider issued one
    pub refresh_token: Option<String>,
}

impl fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Identity of the user behind a set of upstream credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamProfile {
    /// Stable user id
    pub user_id: String,
    /// Display name, when the provider shares one
    pub name: Option<String>,
}

/// Operations the authorization server needs from the upstream identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the user is sent to, carrying our `state`
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization endpoint is not a URL
    fn authorization_url(&self, state: &str) -> Result<String, UpstreamError>;

    /// Exchange an upstream authorization code for credentials
    async fn exchange_code(&self, code: &str) -> Result<UpstreamCredentials, UpstreamError>;

    /// Look up the user owning `access_token`
    async fn fetch_profile(&self, access_token: &str) -> Result<UpstreamProfile, UpstreamError>;

    /// Trade a refresh token for new credentials. The returned refresh token
    /// is `None` when the provider did not rotate it.
    async fn refresh(&self, refresh_token: &str) -> Result<UpstreamCredentials, UpstreamError>;
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// `reqwest` implementation of [`IdentityProvider`]
pub struct OAuth2Client {
    config: IdentityProviderConfig,
    redirect_uri: String,
    client: reqwest::Client,
}

impl OAuth2Client {
    /// Create a client that asks the provider to redirect to `redirect_uri`
    #[must_use]
    pub fn new(config: IdentityProviderConfig, redirect_uri: String) -> Self {
        Self {
            config,
            redirect_uri,
            client: oauth_client(),
        }
    }

    async fn post_token_form(
        &self,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, UpstreamError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await
            .map_err(|e| UpstreamError::network(SERVICE, e.to_string()))?;
        read_json(response).await
    }
}

#[async_trait]
impl IdentityProvider for OAuth2Client {
    fn authorization_url(&self, state: &str) -> Result<String, UpstreamError> {
        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|e| UpstreamError::decode(SERVICE, format!("invalid authorize URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<UpstreamCredentials, UpstreamError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let token = self.post_token_form(&params).await?;
        Ok(UpstreamCredentials {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<UpstreamProfile, UpstreamError> {
        let response = self
            .client
            .get(&self.config.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| UpstreamError::network(SERVICE, e.to_string()))?;
        let profile: Value = read_json(response).await?;
        profile_from_json(&profile)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<UpstreamCredentials, UpstreamError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let token = self.post_token_form(&params).await?;
        Ok(UpstreamCredentials {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, UpstreamError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| UpstreamError::network(SERVICE, e.to_string()))?;
    if !status.is_success() {
        return Err(UpstreamError::rejected(SERVICE, status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| UpstreamError::decode(SERVICE, e.to_string()))
}

/// Pull a stable user id out of a profile document.
///
/// Providers disagree on the field name, so `id`, `user_id`, and `sub` are
/// tried in order. Numeric ids are stringified. A `data` or `user` envelope
/// is unwrapped first.
///
/// # Errors
///
/// Returns a decode error when no id can be found
pub fn profile_from_json(profile: &Value) -> Result<UpstreamProfile, UpstreamError> {
    let document = ["data", "user"]
        .iter()
        .find_map(|key| profile.get(key).filter(|inner| inner.is_object()))
        .unwrap_or(profile);

    let user_id = ["id", "user_id", "sub"]
        .iter()
        .find_map(|key| match document.get(key)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
        .ok_or_else(|| UpstreamError::decode(SERVICE, "profile has no user id"))?;

    let name = ["name", "display_name", "username"]
        .iter()
        .find_map(|key| document.get(key)?.as_str().map(str::to_owned));

    Ok(UpstreamProfile { user_id, name })
}
