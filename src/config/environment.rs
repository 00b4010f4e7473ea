// ABOUTME: Environment-based configuration for the authorization server and session layer
// ABOUTME: Reads identity-provider credentials, URLs, secrets, and timings from env vars
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Environment-only configuration
//!
//! Every setting comes from an environment variable. Loading goes through a
//! lookup function so that tests can feed a map instead of mutating the
//! process environment.

use std::env;
use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use learnhub_core::constants::{defaults, oauth, ports, protocol};
use learnhub_core::errors::{AppError, AppResult};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

/// Development/debug loopback redirect targets always accepted by registration
pub const DEVELOPMENT_REDIRECT_URIS: &[&str] = &[
    // MCP Inspector
    "http://localhost:6274/oauth/callback",
    "http://localhost:6274/oauth/callback/debug",
    "http://127.0.0.1:6274/oauth/callback",
    // VS Code
    "http://127.0.0.1:33418",
];

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Upstream identity provider settings
#[derive(Clone)]
pub struct IdentityProviderConfig {
    /// Provider slug used in `/oauth/{provider}/callback`
    pub provider: String,
    /// Client id registered with the provider
    pub client_id: String,
    /// Client secret registered with the provider
    pub client_secret: String,
    /// Provider authorization endpoint
    pub authorize_url: String,
    /// Provider token endpoint
    pub token_url: String,
    /// Provider profile endpoint
    pub profile_url: String,
    /// Scopes requested upstream
    pub scopes: Vec<String>,
}

impl fmt::Debug for IdentityProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProviderConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("profile_url", &self.profile_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Upstream learning API settings
#[derive(Debug, Clone)]
pub struct LearningApiConfig {
    /// Base URL of the learning API
    pub base_url: String,
}

/// Bearer token settings
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: String,
    /// Bearer token lifetime in seconds
    pub bearer_ttl_secs: u64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("bearer_ttl_secs", &self.bearer_ttl_secs)
            .finish()
    }
}

/// Session reaping settings
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Idle time before eviction
    pub idle_timeout_secs: u64,
    /// Interval between sweeps
    pub sweep_interval_secs: u64,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Issuer base URL, without trailing slash
    pub base_url: String,
    /// Redirect URL registered with the identity provider
    pub oauth_redirect_url: String,
    /// Identity provider settings
    pub identity_provider: IdentityProviderConfig,
    /// Learning API settings
    pub learning_api: LearningApiConfig,
    /// Bearer token settings
    pub auth: AuthConfig,
    /// Session settings
    pub sessions: SessionSettings,
    /// Allowed CORS origins; `*` allows any
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment =
            Environment::from_str_or_default(&var("ENVIRONMENT").unwrap_or_default());

        let http_port = match var("HTTP_PORT").or_else(|| var("PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| AppError::config_invalid(format!("HTTP_PORT '{raw}': {e}")))?,
            None => ports::DEFAULT_HTTP_PORT,
        };

        let base_url = match var("BASE_URL") {
            Some(url) => validated_url("BASE_URL", &url)?,
            None if environment.is_production() => {
                return Err(AppError::config_missing("BASE_URL"));
            }
            None => format!("http://localhost:{http_port}"),
        };

        let provider = var("LEARNHUB_PROVIDER").unwrap_or_else(|| defaults::PROVIDER_SLUG.into());
        let oauth_redirect_url = match var("OAUTH_REDIRECT_URL") {
            Some(url) => validated_url("OAUTH_REDIRECT_URL", &url)?,
            None => format!("{base_url}/oauth/{provider}/callback"),
        };

        let api_base = validated_url(
            "LEARNHUB_API_BASE_URL",
            &var("LEARNHUB_API_BASE_URL").unwrap_or_else(|| defaults::LEARNING_API_BASE_URL.into()),
        )?;

        let identity_provider = IdentityProviderConfig {
            client_id: var("LEARNHUB_CLIENT_ID")
                .ok_or_else(|| AppError::config_missing("LEARNHUB_CLIENT_ID"))?,
            client_secret: var("LEARNHUB_CLIENT_SECRET")
                .ok_or_else(|| AppError::config_missing("LEARNHUB_CLIENT_SECRET"))?,
            authorize_url: url_or_derived(
                &var,
                "LEARNHUB_AUTH_URL",
                &api_base,
                "/oauth/authorize",
            )?,
            token_url: url_or_derived(&var, "LEARNHUB_TOKEN_URL", &api_base, "/oauth/token")?,
            profile_url: url_or_derived(&var, "LEARNHUB_PROFILE_URL", &api_base, "/api/v1/me")?,
            scopes: parse_list(
                &var("LEARNHUB_SCOPES").unwrap_or_else(|| defaults::UPSTREAM_SCOPES.into()),
            ),
            provider,
        };

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => {
                return Err(AppError::config_missing("JWT_SECRET"));
            }
            None => {
                warn!(
                    "JWT_SECRET not set; using a random per-process secret, tokens will not survive restarts"
                );
                random_secret()?
            }
        };

        let config = Self {
            http_port,
            environment,
            base_url,
            oauth_redirect_url,
            identity_provider,
            learning_api: LearningApiConfig { base_url: api_base },
            auth: AuthConfig {
                jwt_secret,
                bearer_ttl_secs: parse_u64(
                    &var,
                    "BEARER_TOKEN_TTL_SECS",
                    oauth::BEARER_TOKEN_TTL_SECS,
                )?,
            },
            sessions: SessionSettings {
                idle_timeout_secs: parse_u64(
                    &var,
                    "SESSION_IDLE_TIMEOUT_SECS",
                    protocol::SESSION_IDLE_TIMEOUT_SECS,
                )?,
                sweep_interval_secs: parse_u64(
                    &var,
                    "SESSION_SWEEP_INTERVAL_SECS",
                    protocol::SESSION_SWEEP_INTERVAL_SECS,
                )?,
            },
            cors_allowed_origins: parse_origins(
                &var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".into()),
            ),
        };

        info!(
            environment = %config.environment,
            issuer = %config.base_url,
            provider = %config.identity_provider.provider,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Path of the upstream callback route for the configured provider
    #[must_use]
    pub fn callback_path(&self) -> String {
        format!("/oauth/{}/callback", self.identity_provider.provider)
    }

    /// Exact-match redirect URIs accepted in addition to the scheme rules
    #[must_use]
    pub fn redirect_allow_list(&self) -> Vec<String> {
        let mut allowed = vec![
            format!("{}{}", self.base_url, self.callback_path()),
            self.oauth_redirect_url.clone(),
        ];
        allowed.extend(DEVELOPMENT_REDIRECT_URIS.iter().map(|uri| (*uri).to_owned()));
        allowed.dedup();
        allowed
    }
}

fn validated_url(key: &str, raw: &str) -> AppResult<String> {
    Url::parse(raw).map_err(|e| AppError::config_invalid(format!("{key} '{raw}': {e}")))?;
    Ok(raw.trim_end_matches('/').to_owned())
}

fn url_or_derived<F>(var: &F, key: &str, base: &str, path: &str) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    var(key).map_or_else(
        || Ok(format!("{base}{path}")),
        |url| validated_url(key, &url),
    )
}

fn parse_u64<F>(var: &F, key: &str, default: u64) -> AppResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    var(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e| AppError::config_invalid(format!("{key} '{raw}': {e}")))
    })
}

/// Parse comma-separated values
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse comma-separated CORS origins
fn parse_origins(raw: &str) -> Vec<String> {
    if raw.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        parse_list(raw)
    }
}

fn random_secret() -> AppResult<String> {
    let mut bytes = [0u8; 32];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::internal("Failed to generate JWT secret"))?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
