// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: In-process identity provider and learning API fakes plus server wiring helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `learnhub_mcp_server`

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use learnhub_core::errors::UpstreamError;
use learnhub_mcp_server::config::ServerConfig;
use learnhub_mcp_server::mcp::ServerResources;
use learnhub_mcp_server::oauth2_client::{IdentityProvider, UpstreamCredentials, UpstreamProfile};
use learnhub_mcp_server::oauth2_server::pkce::s256_challenge;
use learnhub_mcp_server::oauth2_server::{
    AuthorizeRequest, OAuth2AuthorizationServer, TokenRequest, TokenResponse,
    UpstreamCallbackParams,
};
use learnhub_mcp_server::providers::{LearningApi, LearningApiError, Page};
use serde_json::{json, Value};
use url::Url;

static INIT_LOGGER: Once = Once::new();

pub const TEST_ISSUER: &str = "http://localhost:8080";
pub const TEST_REDIRECT_URI: &str = "http://localhost:6274/oauth/callback";
pub const TEST_CLIENT_ID: &str = "test-client";
pub const TEST_USER_ID: &str = "learner-42";
pub const TEST_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Identity provider fake: every code exchanges, every user is [`TEST_USER_ID`]
pub struct MockIdentityProvider {
    pub refresh_calls: AtomicUsize,
    pub rotate_refresh_token: AtomicBool,
    pub fail_refresh: AtomicBool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            rotate_refresh_token: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn authorization_url(&self, state: &str) -> Result<String, UpstreamError> {
        Url::parse_with_params(
            "https://idp.learnhub.test/oauth/authorize",
            &[("state", state)],
        )
            .map(String::from)
            .map_err(|e| UpstreamError::decode("identity provider", e.to_string()))
    }

    async fn exchange_code(&self, code: &str) -> Result<UpstreamCredentials, UpstreamError> {
        if code == "rejected-code" {
            return Err(UpstreamError::rejected("identity provider", 400, "invalid_grant"));
        }
        Ok(UpstreamCredentials {
            access_token: format!("upstream-access-{code}"),
            refresh_token: Some(format!("upstream-refresh-{code}")),
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<UpstreamProfile, UpstreamError> {
        Ok(UpstreamProfile {
            user_id: TEST_USER_ID.into(),
            name: Some("Test Learner".into()),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<UpstreamCredentials, UpstreamError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(UpstreamError::rejected("identity provider", 400, "invalid_grant"));
        }
        Ok(UpstreamCredentials {
            access_token: format!("fresh-access-{n}"),
            refresh_token: self
                .rotate_refresh_token
                .load(Ordering::SeqCst)
                .then(|| format!("rotated-refresh-{n}")),
        })
    }
}

/// Learning API fake that rejects chosen tokens with 401
pub struct MockLearningApi {
    rejected_tokens: Mutex<HashSet<String>>,
    reject_all: AtomicBool,
    seen_tokens: Mutex<Vec<String>>,
}

impl MockLearningApi {
    pub fn new() -> Self {
        Self {
            rejected_tokens: Mutex::new(HashSet::new()),
            reject_all: AtomicBool::new(false),
            seen_tokens: Mutex::new(Vec::new()),
        }
    }

    /// Answer 401 for `token` from now on
    pub fn expire_token(&self, token: &str) {
        self.rejected_tokens.lock().unwrap().insert(token.to_owned());
    }

    /// Answer 401 for every token
    pub fn reject_all_tokens(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    /// Tokens presented so far, in order
    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen_tokens.lock().unwrap().clone()
    }

    fn check(&self, token: &str) -> Result<(), LearningApiError> {
        self.seen_tokens.lock().unwrap().push(token.to_owned());
        if self.reject_all.load(Ordering::SeqCst)
            || self.rejected_tokens.lock().unwrap().contains(token)
        {
            return Err(LearningApiError::Unauthorized);
        }
        Ok(())
    }
}

impl Default for MockLearningApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LearningApi for MockLearningApi {
    async fn list_courses(
        &self,
        access_token: &str,
        page: Page,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        Ok(json!({
            "courses": [{ "id": "c1", "title": "Rust 101" }],
            "page": page.page.unwrap_or(1),
        }))
    }

    async fn get_course(
        &self,
        access_token: &str,
        course_id: &str,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        if course_id == "missing" {
            return Err(LearningApiError::NotFound {
                resource: format!("course {course_id}"),
            });
        }
        Ok(json!({ "id": course_id, "title": "Rust 101" }))
    }

    async fn create_course(
        &self,
        access_token: &str,
        course: &Value,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        let mut created = course.clone();
        created["id"] = json!("c-new");
        Ok(created)
    }

    async fn update_course(
        &self,
        access_token: &str,
        course_id: &str,
        changes: &Value,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        Ok(json!({ "id": course_id, "changes": changes }))
    }

    async fn delete_course(
        &self,
        access_token: &str,
        _course_id: &str,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        Ok(json!({ "success": true }))
    }

    async fn list_lessons(
        &self,
        access_token: &str,
        course_id: &str,
        _page: Page,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        Ok(json!({ "course_id": course_id, "lessons": [{ "id": "l1", "title": "Ownership" }] }))
    }

    async fn get_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        Ok(json!({ "id": lesson_id, "course_id": course_id, "title": "Ownership" }))
    }

    async fn create_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson: &Value,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        let mut created = lesson.clone();
        created["id"] = json!("l-new");
        created["course_id"] = json!(course_id);
        Ok(created)
    }

    async fn update_lesson(
        &self,
        access_token: &str,
        course_id: &str,
        lesson_id: &str,
        changes: &Value,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        Ok(json!({ "id": lesson_id, "course_id": course_id, "changes": changes }))
    }

    async fn delete_lesson(
        &self,
        access_token: &str,
        _course_id: &str,
        _lesson_id: &str,
    ) -> Result<Value, LearningApiError> {
        self.check(access_token)?;
        Ok(json!({ "success": true }))
    }
}

/// Development configuration with fixed secrets
pub fn test_config() -> ServerConfig {
    let vars: HashMap<&str, &str> = [
        ("LEARNHUB_CLIENT_ID", "learnhub-client"),
        ("LEARNHUB_CLIENT_SECRET", "learnhub-secret"),
        ("JWT_SECRET", "integration-test-secret-that-is-long-enough"),
        ("BASE_URL", TEST_ISSUER),
        ("LEARNHUB_API_BASE_URL", "https://api.learnhub.test"),
    ]
    .into_iter()
    .collect();
    ServerConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_owned()))
        .expect("test configuration must load")
}

/// Test doubles wired into a complete resource container
pub struct TestServer {
    pub resources: Arc<ServerResources>,
    pub identity_provider: Arc<MockIdentityProvider>,
    pub learning_api: Arc<MockLearningApi>,
}

impl TestServer {
    pub fn new() -> Self {
        init_test_logging();
        let identity_provider = Arc::new(MockIdentityProvider::new());
        let learning_api = Arc::new(MockLearningApi::new());
        let resources = Arc::new(ServerResources::new(
            Arc::new(test_config()),
            identity_provider.clone(),
            learning_api.clone(),
        ));
        Self {
            resources,
            identity_provider,
            learning_api,
        }
    }

    pub fn auth_server(&self) -> &OAuth2AuthorizationServer {
        &self.resources.auth_server
    }

    /// Signed bearer token for `subject` carrying `credentials`
    pub fn bearer_for(&self, subject: &str, credentials: &UpstreamCredentials) -> String {
        self.auth_server()
            .tokens()
            .issue(subject, credentials, None)
            .expect("bearer token must issue")
    }
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Valid authorization request for the test client
pub fn authorize_request(state: Option<&str>) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: Some("code".into()),
        client_id: Some(TEST_CLIENT_ID.into()),
        redirect_uri: Some(TEST_REDIRECT_URI.into()),
        scope: Some("courses".into()),
        state: state.map(str::to_owned),
        code_challenge: Some(s256_challenge(TEST_VERIFIER)),
        code_challenge_method: Some("S256".into()),
    }
}

/// The `state` query parameter of a URL
pub fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Run authorize and the upstream callback, returning our authorization code
pub async fn obtain_authorization_code(server: &OAuth2AuthorizationServer) -> String {
    let upstream_url = server
        .begin_authorization(authorize_request(Some("client-state")))
        .expect("authorization must start");
    let state = query_param(&upstream_url, "state").expect("upstream URL carries state");

    let redirect = server
        .handle_upstream_callback(UpstreamCallbackParams {
            code: Some("upstream-code".into()),
            state: Some(state),
            error: None,
            error_description: None,
        })
        .await
        .expect("callback must succeed");
    query_param(&redirect, "code").expect("client redirect carries code")
}

/// Authorization code grant with the given verifier
pub fn code_grant(code: &str, verifier: &str) -> TokenRequest {
    TokenRequest {
        grant_type: Some("authorization_code".into()),
        code: Some(code.to_owned()),
        redirect_uri: Some(TEST_REDIRECT_URI.into()),
        client_id: Some(TEST_CLIENT_ID.into()),
        code_verifier: Some(verifier.to_owned()),
        ..TokenRequest::default()
    }
}

/// Full authorization code flow ending in a token response
pub async fn complete_authorization(server: &OAuth2AuthorizationServer) -> TokenResponse {
    let code = obtain_authorization_code(server).await;
    server
        .exchange_token(code_grant(&code, TEST_VERIFIER))
        .expect("token exchange must succeed")
}
