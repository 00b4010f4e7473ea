// ABOUTME: OAuth 2.1 PKCE authorization flow tests against an in-process identity provider
// ABOUTME: Covers code issuance, single-use codes, pending expiry, refresh grants, and bearer checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{
    authorize_request, code_grant, complete_authorization, obtain_authorization_code,
    query_param, TestServer, TEST_CLIENT_ID, TEST_USER_ID, TEST_VERIFIER,
};
use learnhub_mcp_server::oauth2_server::{
    AuthorizeRequest, BearerClaims, BearerTokenManager, TokenRequest, UpstreamCallbackParams,
    UpstreamCredentials,
};

fn callback(state: Option<String>, code: &str) -> UpstreamCallbackParams {
    UpstreamCallbackParams {
        code: Some(code.to_owned()),
        state,
        error: None,
        error_description: None,
    }
}

#[tokio::test]
async fn test_full_flow_issues_bearer_for_upstream_user() {
    let server = TestServer::new();
    let auth = server.auth_server();

    let upstream_url = auth
        .begin_authorization(authorize_request(Some("client-state")))
        .unwrap();
    assert!(upstream_url.starts_with("https://idp.learnhub.test/oauth/authorize"));
    let state = query_param(&upstream_url, "state").unwrap();
    let (key, _) = state.split_once(':').expect("state is key:upstream_state");
    assert!(auth.has_pending_authorization(key));

    let redirect = auth
        .handle_upstream_callback(callback(Some(state.clone()), "abc"))
        .await
        .unwrap();
    assert!(redirect.starts_with("http://localhost:6274/oauth/callback?"));
    assert_eq!(
        query_param(&redirect, "state").as_deref(),
        Some("client-state")
    );
    assert!(!auth.has_pending_authorization(key));

    let code = query_param(&redirect, "code").unwrap();
    let tokens = auth.exchange_token(code_grant(&code, TEST_VERIFIER)).unwrap();
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.scope.as_deref(), Some("courses"));
    assert!(tokens.expires_in > 0);

    let bearer = auth.verify_bearer(&tokens.access_token).unwrap();
    assert_eq!(bearer.subject, TEST_USER_ID);
    assert_eq!(
        bearer.upstream_credentials.access_token,
        "upstream-access-abc"
    );
    assert_eq!(
        bearer.upstream_credentials.refresh_token.as_deref(),
        Some("upstream-refresh-abc")
    );
}

#[tokio::test]
async fn test_wrong_verifier_fails_and_consumes_code() {
    let server = TestServer::new();
    let auth = server.auth_server();
    let code = obtain_authorization_code(auth).await;

    let wrong = "x".repeat(43);
    let error = auth.exchange_token(code_grant(&code, &wrong)).unwrap_err();
    assert_eq!(error.error, "invalid_grant");

    // The right verifier no longer helps: the code was taken on first lookup
    let error = auth
        .exchange_token(code_grant(&code, TEST_VERIFIER))
        .unwrap_err();
    assert_eq!(error.error, "invalid_grant");
}

#[tokio::test]
async fn test_code_is_single_use() {
    let server = TestServer::new();
    let auth = server.auth_server();
    let code = obtain_authorization_code(auth).await;

    assert!(auth.exchange_token(code_grant(&code, TEST_VERIFIER)).is_ok());
    let replay = auth
        .exchange_token(code_grant(&code, TEST_VERIFIER))
        .unwrap_err();
    assert_eq!(replay.error, "invalid_grant");
}

#[tokio::test]
async fn test_code_bound_to_client_and_redirect() {
    let server = TestServer::new();
    let auth = server.auth_server();

    let code = obtain_authorization_code(auth).await;
    let mut request = code_grant(&code, TEST_VERIFIER);
    request.client_id = Some("someone-else".into());
    assert_eq!(
        auth.exchange_token(request).unwrap_err().error,
        "invalid_grant"
    );

    let code = obtain_authorization_code(auth).await;
    let mut request = code_grant(&code, TEST_VERIFIER);
    request.redirect_uri = Some("http://localhost:9999/other".into());
    assert_eq!(
        auth.exchange_token(request).unwrap_err().error,
        "invalid_grant"
    );
}

#[tokio::test(start_paused = true)]
async fn test_pending_authorization_expires_after_ten_minutes() {
    let server = TestServer::new();
    let auth = server.auth_server();

    let upstream_url = auth
        .begin_authorization(authorize_request(None))
        .unwrap();
    let state = query_param(&upstream_url, "state").unwrap();

    tokio::time::advance(Duration::from_secs(10 * 60 + 1)).await;

    let error = auth
        .handle_upstream_callback(callback(Some(state), "late"))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_request");
}

#[tokio::test(start_paused = true)]
async fn test_purge_drops_only_expired_pending() {
    let server = TestServer::new();
    let auth = server.auth_server();

    auth.begin_authorization(authorize_request(None)).unwrap();
    tokio::time::advance(Duration::from_secs(300)).await;
    auth.begin_authorization(authorize_request(None)).unwrap();
    assert_eq!(auth.pending_authorization_count(), 2);

    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(auth.purge_expired_pending(), 1);
    assert_eq!(auth.pending_authorization_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pending_sweeper_removes_expired_authorizations() {
    let server = TestServer::new();
    let auth = &server.resources.auth_server;
    auth.begin_authorization(authorize_request(None)).unwrap();
    let sweeper = auth.spawn_pending_sweeper();

    tokio::time::sleep(Duration::from_secs(540)).await;
    assert_eq!(auth.pending_authorization_count(), 1);

    // Expires at 600s; the sweep on that tick removes it
    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(auth.pending_authorization_count(), 0);

    sweeper.abort();
}

#[tokio::test]
async fn test_authorize_validation() {
    let server = TestServer::new();
    let auth = server.auth_server();

    let plain = AuthorizeRequest {
        code_challenge_method: Some("plain".into()),
        ..authorize_request(None)
    };
    assert_eq!(
        auth.begin_authorization(plain).unwrap_err().error,
        "invalid_request"
    );

    let token_flow = AuthorizeRequest {
        response_type: Some("token".into()),
        ..authorize_request(None)
    };
    assert_eq!(
        auth.begin_authorization(token_flow).unwrap_err().error,
        "unsupported_response_type"
    );

    let remote_http = AuthorizeRequest {
        redirect_uri: Some("http://evil.example.com/cb".into()),
        ..authorize_request(None)
    };
    assert_eq!(
        auth.begin_authorization(remote_http).unwrap_err().error,
        "invalid_request"
    );

    for redirect_uri in ["https://", "javascript:alert(1)"] {
        let rejected = AuthorizeRequest {
            redirect_uri: Some(redirect_uri.into()),
            ..authorize_request(None)
        };
        assert_eq!(
            auth.begin_authorization(rejected).unwrap_err().error,
            "invalid_request"
        );
    }

    let no_challenge = AuthorizeRequest {
        code_challenge: None,
        ..authorize_request(None)
    };
    assert_eq!(
        auth.begin_authorization(no_challenge).unwrap_err().error,
        "invalid_request"
    );
    assert_eq!(auth.pending_authorization_count(), 0);
}

#[tokio::test]
async fn test_callback_state_checks() {
    let server = TestServer::new();
    let auth = server.auth_server();

    let upstream_url = auth.begin_authorization(authorize_request(None)).unwrap();
    let state = query_param(&upstream_url, "state").unwrap();
    let (key, _) = state.split_once(':').unwrap();

    let forged = format!("{key}:not-the-upstream-state");
    let error = auth
        .handle_upstream_callback(callback(Some(forged), "abc"))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_request");

    // The pending entry was taken by the failed attempt
    let error = auth
        .handle_upstream_callback(callback(Some(state), "abc"))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_request");

    let error = auth
        .handle_upstream_callback(callback(None, "abc"))
        .await
        .unwrap_err();
    assert_eq!(error.error, "invalid_request");
}

#[tokio::test]
async fn test_upstream_denial_maps_to_access_denied() {
    let server = TestServer::new();
    let auth = server.auth_server();

    let upstream_url = auth.begin_authorization(authorize_request(None)).unwrap();
    let state = query_param(&upstream_url, "state").unwrap();
    let error = auth
        .handle_upstream_callback(UpstreamCallbackParams {
            code: None,
            state: Some(state),
            error: Some("access_denied".into()),
            error_description: Some("User declined".into()),
        })
        .await
        .unwrap_err();
    assert_eq!(error.error, "access_denied");
    assert_eq!(auth.pending_authorization_count(), 0);
}

#[tokio::test]
async fn test_upstream_exchange_failure_is_server_error() {
    let server = TestServer::new();
    let auth = server.auth_server();

    let upstream_url = auth.begin_authorization(authorize_request(None)).unwrap();
    let state = query_param(&upstream_url, "state").unwrap();
    let error = auth
        .handle_upstream_callback(callback(Some(state), "rejected-code"))
        .await
        .unwrap_err();
    assert_eq!(error.error, "server_error");
}

#[tokio::test]
async fn test_refresh_grant_keeps_refresh_token() {
    let server = TestServer::new();
    let auth = server.auth_server();
    let tokens = complete_authorization(auth).await;

    let refresh = TokenRequest {
        grant_type: Some("refresh_token".into()),
        refresh_token: Some(tokens.refresh_token.clone()),
        client_id: Some(TEST_CLIENT_ID.into()),
        ..TokenRequest::default()
    };
    let renewed = auth.exchange_token(refresh.clone()).unwrap();
    assert_eq!(renewed.refresh_token, tokens.refresh_token);
    assert_eq!(
        auth.verify_bearer(&renewed.access_token).unwrap().subject,
        TEST_USER_ID
    );

    // Still valid afterwards: refresh tokens are not rotated
    assert!(auth.exchange_token(refresh).is_ok());

    let unknown = TokenRequest {
        grant_type: Some("refresh_token".into()),
        refresh_token: Some("no-such-token".into()),
        ..TokenRequest::default()
    };
    assert_eq!(
        auth.exchange_token(unknown).unwrap_err().error,
        "invalid_grant"
    );
}

#[tokio::test]
async fn test_upstream_refresh_updates_refresh_records() {
    let server = TestServer::new();
    let auth = server.auth_server();
    let tokens = complete_authorization(auth).await;

    let fresh = auth
        .refresh_upstream_credentials("upstream-refresh-upstream-code")
        .await
        .unwrap();
    assert_eq!(fresh.access_token, "fresh-access-1");
    // Provider did not rotate: the old refresh token is carried forward
    assert_eq!(
        fresh.refresh_token.as_deref(),
        Some("upstream-refresh-upstream-code")
    );

    let renewed = auth
        .exchange_token(TokenRequest {
            grant_type: Some("refresh_token".into()),
            refresh_token: Some(tokens.refresh_token),
            ..TokenRequest::default()
        })
        .unwrap();
    let bearer = auth.verify_bearer(&renewed.access_token).unwrap();
    assert_eq!(bearer.upstream_credentials.access_token, "fresh-access-1");
}

#[tokio::test]
async fn test_token_request_errors() {
    let server = TestServer::new();
    let auth = server.auth_server();

    let missing = auth.exchange_token(TokenRequest::default()).unwrap_err();
    assert_eq!(missing.error, "invalid_request");

    let unsupported = auth
        .exchange_token(TokenRequest {
            grant_type: Some("client_credentials".into()),
            ..TokenRequest::default()
        })
        .unwrap_err();
    assert_eq!(unsupported.error, "unsupported_grant_type");
}

#[tokio::test]
async fn test_bearer_verification_failures() {
    let server = TestServer::new();
    let auth = server.auth_server();
    let credentials = UpstreamCredentials {
        access_token: "a".into(),
        refresh_token: None,
    };

    let expired = auth
        .tokens()
        .issue_at(
            TEST_USER_ID,
            &credentials,
            None,
            Utc::now() - chrono::Duration::days(2),
        )
        .unwrap();
    assert_eq!(
        auth.verify_bearer(&expired).unwrap_err().error,
        "invalid_token"
    );

    let foreign = BearerTokenManager::new(
        b"another-secret-entirely",
        auth.config().issuer.as_str(),
        auth.config().resource.as_str(),
        3600,
    )
    .issue(TEST_USER_ID, &credentials, None)
    .unwrap();
    assert_eq!(
        auth.verify_bearer(&foreign).unwrap_err().error,
        "invalid_token"
    );

    assert_eq!(
        auth.verify_bearer("not.a.jwt").unwrap_err().error,
        "invalid_token"
    );

    let good = server.bearer_for(TEST_USER_ID, &credentials);
    assert!(auth.verify_bearer(&good).is_ok());
}

fn claims_for(audience: &str, issuer: &str) -> BearerClaims {
    let now = Utc::now();
    BearerClaims {
        sub: TEST_USER_ID.to_owned(),
        upstream_access_token: "a".into(),
        upstream_refresh_token: None,
        scope: None,
        aud: audience.to_owned(),
        iss: issuer.to_owned(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
        jti: "jti-1".into(),
    }
}

#[tokio::test]
async fn test_bearer_for_other_audience_or_issuer_is_rejected() {
    let server = TestServer::new();
    let auth = server.auth_server();
    let issuer = auth.config().issuer.clone();
    let resource = auth.config().resource.clone();

    let other_audience = auth
        .tokens()
        .encode_claims(&claims_for("https://other.example.com/mcp", &issuer))
        .unwrap();
    let error = auth.verify_bearer(&other_audience).unwrap_err();
    assert_eq!(error.error, "invalid_token");
    assert_eq!(
        error.error_description.as_deref(),
        Some("The access token was not issued for this resource")
    );

    let other_issuer = auth
        .tokens()
        .encode_claims(&claims_for(&resource, "https://rogue.example.com"))
        .unwrap();
    let error = auth.verify_bearer(&other_issuer).unwrap_err();
    assert_eq!(error.error, "invalid_token");
    assert_eq!(
        error.error_description.as_deref(),
        Some("The access token was issued by another server")
    );

    let matching = auth
        .tokens()
        .encode_claims(&claims_for(&resource, &issuer))
        .unwrap();
    assert_eq!(auth.verify_bearer(&matching).unwrap().subject, TEST_USER_ID);
}
