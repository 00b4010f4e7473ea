// ABOUTME: HTTP integration tests for discovery, OAuth, MCP session, and health routes
// ABOUTME: Drives the assembled axum router in-process with tower's oneshot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{
    query_param, TestServer, TEST_CLIENT_ID, TEST_ISSUER, TEST_REDIRECT_URI, TEST_USER_ID,
    TEST_VERIFIER,
};
use helpers::axum_test::AxumTestRequest;
use learnhub_mcp_server::oauth2_server::pkce::s256_challenge;
use learnhub_mcp_server::oauth2_server::UpstreamCredentials;
use learnhub_mcp_server::server::build_router;
use serde_json::{json, Value};

fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": { "name": "http-test", "version": "1.0" }
        }
    })
}

fn test_bearer(server: &TestServer) -> String {
    server.bearer_for(
        TEST_USER_ID,
        &UpstreamCredentials {
            access_token: "access-1".into(),
            refresh_token: Some("refresh-1".into()),
        },
    )
}

#[tokio::test]
async fn test_authorization_server_metadata() {
    let server = TestServer::new();
    let response = AxumTestRequest::get("/.well-known/oauth-authorization-server")
        .send(build_router(&server.resources))
        .await;

    assert_eq!(response.status(), 200);
    let metadata: Value = response.json();
    assert_eq!(metadata["issuer"], TEST_ISSUER);
    assert_eq!(
        metadata["token_endpoint"],
        format!("{TEST_ISSUER}/oauth/token")
    );
    assert_eq!(metadata["code_challenge_methods_supported"], json!(["S256"]));
    assert_eq!(
        metadata["grant_types_supported"],
        json!(["authorization_code", "refresh_token"])
    );
}

#[tokio::test]
async fn test_protected_resource_metadata() {
    let server = TestServer::new();
    for path in [
        "/.well-known/oauth-protected-resource",
        "/.well-known/oauth-protected-resource/mcp",
    ] {
        let response = AxumTestRequest::get(path)
            .send(build_router(&server.resources))
            .await;
        assert_eq!(response.status(), 200);
        let metadata: Value = response.json();
        assert_eq!(metadata["resource"], format!("{TEST_ISSUER}/mcp"));
        assert_eq!(metadata["authorization_servers"], json!([TEST_ISSUER]));
    }
}

#[tokio::test]
async fn test_mcp_requires_bearer() {
    let server = TestServer::new();
    let response = AxumTestRequest::post("/mcp")
        .json(&initialize_body())
        .send(build_router(&server.resources))
        .await;

    assert_eq!(response.status(), 401);
    let challenge = response.header("www-authenticate").unwrap();
    assert_eq!(
        challenge,
        format!(
            "Bearer resource_metadata=\"{TEST_ISSUER}/.well-known/oauth-protected-resource\""
        )
    );
}

#[tokio::test]
async fn test_mcp_rejects_invalid_bearer() {
    let server = TestServer::new();
    let response = AxumTestRequest::get("/mcp")
        .bearer("forged.token.value")
        .send(build_router(&server.resources))
        .await;

    assert_eq!(response.status(), 401);
    let challenge = response.header("www-authenticate").unwrap();
    assert!(challenge.contains("error=\"invalid_token\""));
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_mcp_session_lifecycle_over_http() {
    let server = TestServer::new();
    let bearer = test_bearer(&server);

    let response = AxumTestRequest::post("/mcp")
        .bearer(&bearer)
        .json(&initialize_body())
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 200);
    let session_id = response.header("mcp-session-id").unwrap();
    assert_eq!(
        response.header("Mcp-Session-Id").as_deref(),
        Some(session_id.as_str())
    );
    assert!(response
        .header("access-control-expose-headers")
        .unwrap()
        .contains("Mcp-Session-Id"));
    let body: Value = response.json();
    assert_eq!(body["result"]["protocolVersion"], "2025-06-18");

    let response = AxumTestRequest::post("/mcp")
        .bearer(&bearer)
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 202);
    assert_eq!(response.header("mcp-session-id"), Some(session_id.clone()));

    let response = AxumTestRequest::post("/mcp")
        .bearer(&bearer)
        .header("mcp-session-id", &session_id)
        .json(&json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/call",
                       "params": { "name": "list_courses", "arguments": {} } }))
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(
        body["result"]["structuredContent"]["courses"][0]["title"],
        "Rust 101"
    );

    let response = AxumTestRequest::get("/mcp")
        .bearer(&bearer)
        .header("mcp-session-id", &session_id)
        .send_sse(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 200);
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/event-stream"));

    let response = AxumTestRequest::delete("/mcp")
        .bearer(&bearer)
        .header("mcp-session-id", &session_id)
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 204);

    let response = AxumTestRequest::delete("/mcp")
        .bearer(&bearer)
        .header("mcp-session-id", &session_id)
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_mcp_without_session_id() {
    let server = TestServer::new();
    let response = AxumTestRequest::post("/mcp")
        .bearer(&test_bearer(&server))
        .json(&json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }))
        .send(build_router(&server.resources))
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(
        body["error"]["message"],
        "Bad Request: No valid session ID provided"
    );
}

#[tokio::test]
async fn test_mcp_recovers_unknown_session_over_http() {
    let server = TestServer::new();
    let response = AxumTestRequest::post("/mcp")
        .bearer(&test_bearer(&server))
        .header("mcp-session-id", "restarted-session")
        .json(&json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/list" }))
        .send(build_router(&server.resources))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.header("mcp-session-id").as_deref(),
        Some("restarted-session")
    );
    let body: Value = response.json();
    assert!(body["result"]["tools"].is_array());
}

#[tokio::test]
async fn test_mcp_unsupported_method() {
    let server = TestServer::new();
    let response = AxumTestRequest::put("/mcp")
        .bearer(&test_bearer(&server))
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn test_register_client() {
    let server = TestServer::new();
    let response = AxumTestRequest::post("/oauth/register")
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json();
    assert!(body["client_id"].is_string());
    assert_eq!(body["token_endpoint_auth_method"], "none");

    let response = AxumTestRequest::post("/oauth/register")
        .json(&json!({ "redirect_uris": ["http://evil.example.com/cb"] }))
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_redirect_uri");
}

#[tokio::test]
async fn test_authorization_code_flow_over_http() {
    let server = TestServer::new();
    let challenge = s256_challenge(TEST_VERIFIER);
    let query = serde_urlencoded::to_string([
        ("response_type", "code"),
        ("client_id", TEST_CLIENT_ID),
        ("redirect_uri", TEST_REDIRECT_URI),
        ("state", "xyz"),
        ("code_challenge", challenge.as_str()),
        ("code_challenge_method", "S256"),
    ])
    .unwrap();

    let response = AxumTestRequest::get(&format!("/oauth/authorize?{query}"))
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 302);
    let upstream = response.header("location").unwrap();
    let state = query_param(&upstream, "state").unwrap();

    let callback =
        serde_urlencoded::to_string([("code", "web"), ("state", state.as_str())]).unwrap();
    let response = AxumTestRequest::get(&format!("/oauth/learnhub/callback?{callback}"))
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 302);
    let client_redirect = response.header("location").unwrap();
    assert_eq!(
        query_param(&client_redirect, "state").as_deref(),
        Some("xyz")
    );
    let code = query_param(&client_redirect, "code").unwrap();

    let response = AxumTestRequest::post("/oauth/token")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", TEST_REDIRECT_URI),
            ("client_id", TEST_CLIENT_ID),
            ("code_verifier", TEST_VERIFIER),
        ])
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.header("cache-control").as_deref(),
        Some("no-store")
    );
    let tokens: Value = response.json();
    assert_eq!(tokens["token_type"], "Bearer");

    let access_token = tokens["access_token"].as_str().unwrap();
    let response = AxumTestRequest::post("/mcp")
        .bearer(access_token)
        .json(&initialize_body())
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_callback_for_unknown_provider() {
    let server = TestServer::new();
    let response = AxumTestRequest::get("/oauth/otherhub/callback?code=a&state=b")
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_token_endpoint_errors() {
    let server = TestServer::new();
    let response = AxumTestRequest::post("/oauth/token")
        .form(&[("grant_type", "authorization_code"), ("code", "nope")])
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_grant");

    let response = AxumTestRequest::post("/oauth/token")
        .form(&[("grant_type", "password")])
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::new();
    let response = AxumTestRequest::get("/health")
        .send(build_router(&server.resources))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_sessions"], 0);
}
