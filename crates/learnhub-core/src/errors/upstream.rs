// ABOUTME: Error type for calls to the upstream identity provider and learning API
// ABOUTME: Separates rejections from network and decode failures for callers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{AppError, ErrorCode};

/// Failure of a call to an upstream service.
///
/// Callers need to tell an upstream *rejection* (the service answered and
/// said no) apart from a *network* failure (the service never answered), so
/// the two are distinct variants rather than a single message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// Upstream answered with a non-success status
    #[error("{service} rejected the request with HTTP {status}: {body}")]
    Rejected {
        /// Which upstream service answered
        service: &'static str,
        /// HTTP status returned
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Upstream could not be reached or the connection failed mid-request
    #[error("{service} network error: {message}")]
    Network {
        /// Which upstream service was called
        service: &'static str,
        /// Transport error description
        message: String,
    },

    /// Upstream answered successfully but the payload was unusable
    #[error("{service} returned an unexpected response: {message}")]
    Decode {
        /// Which upstream service answered
        service: &'static str,
        /// What was wrong with the payload
        message: String,
    },
}

impl UpstreamError {
    /// Maximum number of body bytes kept in a [`UpstreamError::Rejected`]
    pub const MAX_BODY_LEN: usize = 512;

    /// Build a rejection, truncating the body on a char boundary
    pub fn rejected(service: &'static str, status: u16, body: &str) -> Self {
        let mut end = body.len().min(Self::MAX_BODY_LEN);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        Self::Rejected {
            service,
            status,
            body: body[..end].to_owned(),
        }
    }

    /// Build a network failure
    pub fn network(service: &'static str, message: impl Into<String>) -> Self {
        Self::Network {
            service,
            message: message.into(),
        }
    }

    /// Build a decode failure
    pub fn decode(service: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            service,
            message: message.into(),
        }
    }

    /// True when upstream answered 401 or 403
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Rejected { status: 401 | 403, .. })
    }
}

impl From<UpstreamError> for AppError {
    fn from(error: UpstreamError) -> Self {
        let code = match &error {
            UpstreamError::Rejected { .. } if error.is_auth_rejection() => {
                ErrorCode::ExternalAuthFailed
            }
            UpstreamError::Rejected { .. } | UpstreamError::Decode { .. } => {
                ErrorCode::ExternalServiceError
            }
            UpstreamError::Network { .. } => ErrorCode::ExternalServiceUnavailable,
        };
        Self::new(code, error.to_string()).with_source(error)
    }
}
