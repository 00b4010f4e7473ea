// ABOUTME: PKCE (RFC 7636) challenge computation and verifier checks
// ABOUTME: S256 only; constant-time comparison of the recomputed challenge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use base64::{engine::general_purpose, Engine as _};
use learnhub_core::constants::oauth::{PKCE_VERIFIER_MAX_LEN, PKCE_VERIFIER_MIN_LEN};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::models::OAuth2Error;

/// Unreserved characters (RFC 7636 section 4.1)
fn is_unreserved(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~')
}

/// `BASE64URL-ENCODE(SHA256(ASCII(code_verifier)))`, unpadded
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Shape check applied to incoming challenges at authorization time
///
/// # Errors
///
/// Returns `invalid_request` for a challenge that cannot be an S256 digest
pub fn validate_challenge(challenge: &str) -> Result<(), OAuth2Error> {
    // SHA-256 base64url without padding is exactly 43 characters
    if challenge.len() != 43 || !challenge.chars().all(is_unreserved) {
        return Err(OAuth2Error::invalid_request(
            "code_challenge must be a base64url-encoded SHA-256 digest",
        ));
    }
    Ok(())
}

/// Check a verifier against the stored challenge
///
/// # Errors
///
/// Returns `invalid_grant` for a malformed verifier or a mismatch
pub fn verify(verifier: &str, stored_challenge: &str) -> Result<(), OAuth2Error> {
    if !(PKCE_VERIFIER_MIN_LEN..=PKCE_VERIFIER_MAX_LEN).contains(&verifier.len()) {
        return Err(OAuth2Error::invalid_grant(
            "code_verifier must be between 43 and 128 characters",
        ));
    }
    if !verifier.chars().all(is_unreserved) {
        return Err(OAuth2Error::invalid_grant(
            "code_verifier contains invalid characters",
        ));
    }

    let computed = s256_challenge(verifier);
    if computed.as_bytes().ct_eq(stored_challenge.as_bytes()).into() {
        Ok(())
    } else {
        Err(OAuth2Error::invalid_grant("Invalid code_verifier"))
    }
}
