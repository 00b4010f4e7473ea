// ABOUTME: Response decorator stamping the MCP session id onto every session endpoint response
// ABOUTME: Headers are set on the response head, so they precede the first body byte of any stream

use axum::extract::Request;
use axum::http::header::ACCESS_CONTROL_EXPOSE_HEADERS;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use learnhub_core::constants::protocol::SESSION_ID_HEADER_LOWER;

/// Header names browsers may read from session responses
const EXPOSED_HEADERS: &str = "Mcp-Session-Id, mcp-session-id, WWW-Authenticate";

/// Session id chosen by the handler, carried in response extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

/// Echo the session id on the response.
///
/// The handler's [`SessionId`] extension wins; otherwise the inbound header
/// is reflected. HTTP header names are case-insensitive, so the one entry
/// answers lookups under both `Mcp-Session-Id` and `mcp-session-id`.
pub async fn session_headers(request: Request, next: Next) -> Response {
    let inbound = request.headers().get(SESSION_ID_HEADER_LOWER).cloned();
    let mut response = next.run(request).await;

    let session_id = response
        .extensions()
        .get::<SessionId>()
        .and_then(|id| HeaderValue::from_str(&id.0).ok())
        .or(inbound);
    apply_session_headers(response.headers_mut(), session_id);
    response
}

/// Set the fixed session header set on `headers`
pub fn apply_session_headers(headers: &mut HeaderMap, session_id: Option<HeaderValue>) {
    if let Some(value) = session_id {
        headers.insert(HeaderName::from_static(SESSION_ID_HEADER_LOWER), value);
    }
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
}
