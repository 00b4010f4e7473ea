// ABOUTME: MCP (Model Context Protocol) streamable-HTTP session endpoint
// ABOUTME: POST carries JSON-RPC messages, GET opens the session event stream, DELETE ends the session

//! MCP session endpoint for AI assistant integration

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use learnhub_core::constants::endpoints::MCP;
use learnhub_core::constants::protocol::{SESSION_ID_HEADER_LOWER, STREAM_KEEPALIVE_SECS};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::mcp::{DispatchOutcome, ServerResources, SessionError};
use crate::middleware::{require_bearer, session_headers, SessionId};
use crate::oauth2_server::VerifiedBearer;

/// MCP routes implementation
pub struct McpRoutes;

impl McpRoutes {
    /// Create the session endpoint; every method requires a bearer token
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(MCP, any(Self::handle_session))
            .route_layer(from_fn_with_state(Arc::clone(&resources), require_bearer))
            .layer(from_fn(session_headers))
            .with_state(resources)
    }

    async fn handle_session(
        State(resources): State<Arc<ServerResources>>,
        Extension(bearer): Extension<VerifiedBearer>,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let session_id = headers
            .get(SESSION_ID_HEADER_LOWER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        match method {
            Method::POST => {
                Self::handle_message(&resources, session_id.as_deref(), &bearer, &body).await
            }
            Method::GET => Self::handle_stream(&resources, session_id).await,
            Method::DELETE => Self::handle_delete(&resources, session_id).await,
            _ => (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET, POST, DELETE")],
            )
                .into_response(),
        }
    }

    /// POST: one JSON-RPC message
    async fn handle_message(
        resources: &ServerResources,
        session_id: Option<&str>,
        bearer: &VerifiedBearer,
        body: &[u8],
    ) -> Response {
        match resources
            .sessions
            .dispatch(body, session_id, Some(bearer))
            .await
        {
            Ok(DispatchOutcome::Response {
                session_id,
                response,
            }) => {
                let mut http = (StatusCode::OK, Json(response)).into_response();
                http.extensions_mut().insert(SessionId(session_id));
                http
            }
            Ok(DispatchOutcome::Accepted { session_id }) => {
                let mut http = StatusCode::ACCEPTED.into_response();
                http.extensions_mut().insert(SessionId(session_id));
                http
            }
            Err(error) => {
                tracing::debug!("Session dispatch rejected: {error}");
                error.into_response()
            }
        }
    }

    /// GET: server-sent event stream of server-initiated messages
    async fn handle_stream(resources: &ServerResources, session_id: Option<String>) -> Response {
        let Some(session_id) = session_id else {
            return SessionError::MissingSession.into_response();
        };
        let receiver = match resources.sessions.open_stream(&session_id).await {
            Ok(receiver) => receiver,
            Err(error) => return error.into_response(),
        };

        tracing::info!(session_id = %session_id, "MCP event stream opened");
        let stream_session = session_id.clone();
        let events = BroadcastStream::new(receiver).filter_map(move |message| match message {
            Ok(payload) => Some(Ok::<_, Infallible>(
                Event::default().event("message").data(payload),
            )),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(
                    session_id = %stream_session,
                    skipped,
                    "Event stream lagged; messages dropped"
                );
                None
            }
        });

        let mut response = Sse::new(events)
            .keep_alive(
                KeepAlive::new()
                    .interval(Duration::from_secs(STREAM_KEEPALIVE_SECS))
                    .text("keepalive"),
            )
            .into_response();
        response.extensions_mut().insert(SessionId(session_id));
        response
    }

    /// DELETE: explicit session close
    async fn handle_delete(resources: &ServerResources, session_id: Option<String>) -> Response {
        let Some(session_id) = session_id else {
            return SessionError::MissingSession.into_response();
        };
        if resources.sessions.close_session(&session_id).await {
            let mut response = StatusCode::NO_CONTENT.into_response();
            response.extensions_mut().insert(SessionId(session_id));
            response
        } else {
            SessionError::NotFound(session_id).into_response()
        }
    }
}
