// ABOUTME: Signed bearer token issuance and verification for the authorization server
// ABOUTME: HS256 JWTs carrying the upstream credentials, audience, issuer, and expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use learnhub_core::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{OAuth2Error, UpstreamCredentials, VerifiedBearer};

/// Claims of a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Upstream user id
    pub sub: String,
    /// Upstream access token
    pub upstream_access_token: String,
    /// Upstream refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_refresh_token: Option<String>,
    /// Granted scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Protected resource this token is for
    pub aud: String,
    /// Issuing server
    pub iss: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

/// Mints and verifies bearer tokens with a shared HMAC secret
#[derive(Clone)]
pub struct BearerTokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl BearerTokenManager {
    /// Create a manager for tokens issued by `issuer` for `audience`
    #[must_use]
    pub fn new(secret: &[u8], issuer: &str, audience: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.to_owned(),
            audience: audience.to_owned(),
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000)),
        }
    }

    /// Lifetime of freshly issued tokens in seconds
    #[must_use]
    pub fn ttl_secs(&self) -> u64 {
        u64::try_from(self.ttl.num_seconds()).unwrap_or(0)
    }

    /// Issuer embedded in every token
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Audience embedded in every token
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Issue a token valid from now
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails
    pub fn issue(
        &self,
        subject: &str,
        credentials: &UpstreamCredentials,
        scope: Option<&str>,
    ) -> AppResult<String> {
        self.issue_at(subject, credentials, scope, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails
    pub fn issue_at(
        &self,
        subject: &str,
        credentials: &UpstreamCredentials,
        scope: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> AppResult<String> {
        let claims = BearerClaims {
            sub: subject.to_owned(),
            upstream_access_token: credentials.access_token.clone(),
            upstream_refresh_token: credentials.refresh_token.clone(),
            scope: scope.map(str::to_owned),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        self.encode_claims(&claims)
    }

    /// Sign arbitrary claims with this manager's key
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails
    pub fn encode_claims(&self, claims: &BearerClaims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign bearer token: {e}")))
    }

    /// Verify signature, audience, issuer, and expiry
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` for any failed check
    pub fn verify(&self, token: &str) -> Result<VerifiedBearer, OAuth2Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<BearerClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            let description = match e.kind() {
                ErrorKind::ExpiredSignature => "The access token has expired",
                ErrorKind::InvalidSignature => "The access token signature is invalid",
                ErrorKind::InvalidAudience => "The access token was not issued for this resource",
                ErrorKind::InvalidIssuer => "The access token was issued by another server",
                _ => "The access token is malformed",
            };
            tracing::debug!("Bearer token rejected: {e}");
            OAuth2Error::invalid_token(description)
        })?;

        let claims = data.claims;
        Ok(VerifiedBearer {
            subject: claims.sub,
            upstream_credentials: UpstreamCredentials {
                access_token: claims.upstream_access_token,
                refresh_token: claims.upstream_refresh_token,
            },
            expires_at: claims.exp,
            scope: claims.scope,
        })
    }
}
