// ABOUTME: Structured error type for learning platform API calls
// ABOUTME: Separates credential rejection, which triggers a refresh, from ordinary failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use learnhub_core::errors::{AppError, ErrorCode};
use thiserror::Error;

/// Failure of a learning API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearningApiError {
    /// The access token was rejected (HTTP 401)
    #[error("Learning API rejected the access token")]
    Unauthorized,

    /// The addressed course or lesson does not exist
    #[error("{resource} not found")]
    NotFound {
        /// What was looked up
        resource: String,
    },

    /// Any other non-success status
    #[error("Learning API returned HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or error message
        message: String,
    },

    /// Transport failure
    #[error("Learning API unreachable: {0}")]
    Network(String),

    /// Body could not be decoded
    #[error("Learning API returned an unusable response: {0}")]
    Decode(String),
}

impl LearningApiError {
    /// Whether the error signals expired or revoked credentials
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<LearningApiError> for AppError {
    fn from(error: LearningApiError) -> Self {
        let code = match &error {
            LearningApiError::Unauthorized => ErrorCode::AuthExpired,
            LearningApiError::NotFound { .. } => ErrorCode::ResourceNotFound,
            LearningApiError::Rejected { .. } | LearningApiError::Decode(_) => {
                ErrorCode::ExternalServiceError
            }
            LearningApiError::Network(_) => ErrorCode::ExternalServiceUnavailable,
        };
        Self::new(code, error.to_string())
    }
}
