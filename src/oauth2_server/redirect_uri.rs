// ABOUTME: Redirect URI policy shared by client registration and authorization
// ABOUTME: HTTPS anywhere, HTTP on loopback only, native-app schemes, plus an exact allow-list
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// `scheme ":"` prefix per RFC 3986 section 3.1
static SCHEME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.\-]*):").ok());

const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

const DENIED_SCHEMES: [&str; 4] = ["javascript", "data", "vbscript", "file"];

/// Decides which redirect URIs the server will send codes to
#[derive(Debug, Clone, Default)]
pub struct RedirectUriPolicy {
    allow_list: HashSet<String>,
}

impl RedirectUriPolicy {
    /// Build a policy with exact-match URIs accepted on top of the scheme rules
    #[must_use]
    pub fn new(allow_list: impl IntoIterator<Item = String>) -> Self {
        Self {
            allow_list: allow_list.into_iter().collect(),
        }
    }

    /// Check a redirect URI
    #[must_use]
    pub fn is_allowed(&self, uri: &str) -> bool {
        if uri.trim().is_empty() {
            return false;
        }
        if self.allow_list.contains(uri) {
            return true;
        }

        let Some(scheme) = Self::scheme_of(uri) else {
            tracing::warn!("Rejected redirect_uri without a scheme: {}", uri);
            return false;
        };
        let Ok(parsed) = Url::parse(uri) else {
            tracing::warn!("Rejected malformed redirect_uri: {}", uri);
            return false;
        };

        match scheme.as_str() {
            "https" => parsed.host_str().is_some_and(|host| !host.is_empty()),
            "http" => Self::is_loopback_http(&parsed, uri),
            // Script and inline-content schemes never reach a native app
            s if DENIED_SCHEMES.contains(&s) => {
                tracing::warn!("Rejected redirect_uri with scheme {}: {}", s, uri);
                false
            }
            // Native-app targets (cursor://, vscode://, com.example.app:/cb)
            _ => true,
        }
    }

    fn scheme_of(uri: &str) -> Option<String> {
        let pattern = SCHEME_PATTERN.as_ref()?;
        let captures = pattern.captures(uri)?;
        Some(captures.get(1)?.as_str().to_ascii_lowercase())
    }

    fn is_loopback_http(parsed: &Url, uri: &str) -> bool {
        let allowed = parsed
            .host_str()
            .is_some_and(|host| LOOPBACK_HOSTS.contains(&host));
        if !allowed {
            tracing::warn!(
                "Rejected redirect_uri with non-HTTPS scheme for non-loopback host: {}",
                uri
            );
        }
        allowed
    }
}
