// ABOUTME: Shared HTTP client constructors with timeout configuration
// ABOUTME: Separate tunings for identity-provider exchanges and learning API calls

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

/// Create a new HTTP client with custom timeout settings
///
/// Falls back to a default client if the builder fails.
#[must_use]
pub fn create_client_with_timeout(timeout_secs: u64, connect_timeout_secs: u64) -> Client {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// HTTP client for `OAuth` token exchanges, which should be fast
#[must_use]
pub fn oauth_client() -> Client {
    create_client_with_timeout(15, 5)
}

/// HTTP client for learning API calls
#[must_use]
pub fn api_client() -> Client {
    create_client_with_timeout(60, 10)
}
