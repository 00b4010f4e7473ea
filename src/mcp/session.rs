// ABOUTME: Session manager multiplexing streamable-HTTP clients onto per-session protocol engines
// ABOUTME: Creates, recovers, refreshes, evicts, and shuts down sessions keyed by session id
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Session Manager
//!
//! Owns the map from session id to [`SessionInfo`]. Lock scopes never span an
//! await on the network: the engine is cloned out of the map before a request
//! runs, and the credential refresh path re-reads the entry after the
//! identity provider answers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::future::BoxFuture;
use learnhub_core::constants::errors::{ERROR_SESSION, MSG_NO_SESSION};
use learnhub_core::constants::protocol::{
    SESSION_IDLE_TIMEOUT_SECS, SESSION_STREAM_CAPACITY, SESSION_SWEEP_INTERVAL_SECS,
};
use learnhub_core::errors::{AppError, AppResult};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::ProtocolEngine;
use super::tool_handlers::{AuthContext, RefreshCallback, ToolRegistry};
use super::transport::SessionTransport;
use crate::config::SessionSettings;
use crate::jsonrpc::{IncomingMessage, JsonRpcError, JsonRpcResponse};
use crate::oauth2_server::{CredentialRefresher, UpstreamCredentials, VerifiedBearer};

/// One live session
pub struct SessionInfo {
    /// Protocol engine serving the session
    pub engine: Arc<ProtocolEngine>,
    /// Outbound stream transport
    pub transport: Arc<SessionTransport>,
    /// Upstream credentials tool calls run with; updated in place on refresh
    pub credentials: Option<UpstreamCredentials>,
    /// User the credentials belong to
    pub subject: Option<String>,
    /// Creation time
    pub created_at: Instant,
    /// Last request or stream attach
    pub last_accessed_at: Instant,
}

impl SessionInfo {
    async fn close(&self) {
        self.engine.close().await;
        self.transport.close();
    }
}

/// Session manager timing
#[derive(Debug, Clone, Copy)]
pub struct SessionManagerConfig {
    /// Idle time after which a session is evicted
    pub idle_timeout: Duration,
    /// Interval of the eviction sweep
    pub sweep_interval: Duration,
    /// Outbound buffer per stream
    pub stream_capacity: usize,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(SESSION_IDLE_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS),
            stream_capacity: SESSION_STREAM_CAPACITY,
        }
    }
}

impl From<&SessionSettings> for SessionManagerConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
            sweep_interval: Duration::from_secs(settings.sweep_interval_secs),
            ..Self::default()
        }
    }
}

/// Result of a successful dispatch
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A request was answered
    Response {
        /// Session that served it
        session_id: String,
        /// JSON-RPC response
        response: JsonRpcResponse,
    },
    /// A notification or client response was absorbed
    Accepted {
        /// Session that absorbed it
        session_id: String,
    },
}

impl DispatchOutcome {
    /// Session the message was routed to
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Response { session_id, .. } | Self::Accepted { session_id } => session_id,
        }
    }
}

/// Why a message could not be routed to a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session id and not an `initialize` request
    #[error("{}", MSG_NO_SESSION)]
    MissingSession,

    /// Body is not a JSON-RPC message
    #[error("Malformed request: {}", .0.message)]
    Malformed(JsonRpcError),

    /// Unknown session id where recovery does not apply
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The bearer belongs to a different user than the session
    #[error("Session belongs to a different user")]
    SubjectMismatch,

    /// The manager has been shut down
    #[error("Server is shutting down")]
    ShuttingDown,
}

impl SessionError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingSession | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SubjectMismatch => StatusCode::FORBIDDEN,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// JSON-RPC error body
    #[must_use]
    pub fn to_jsonrpc(&self) -> JsonRpcResponse {
        match self {
            Self::Malformed(error) => JsonRpcResponse::from_error(None, error.clone()),
            other => JsonRpcResponse::error(None, ERROR_SESSION, other.to_string()),
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_jsonrpc())).into_response()
    }
}

/// Owner of every live session
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SessionInfo>>>,
    tools: Arc<ToolRegistry>,
    refresher: Arc<dyn CredentialRefresher>,
    config: SessionManagerConfig,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl SessionManager {
    /// Create an empty manager
    #[must_use]
    pub fn new(
        tools: Arc<ToolRegistry>,
        refresher: Arc<dyn CredentialRefresher>,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            tools,
            refresher,
            config,
            sweeper: std::sync::Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Route one inbound message.
    ///
    /// A known session id is served by its engine. An unknown id is
    /// recovered: a new session is created under the same id and the
    /// message is served by it. Without an id only `initialize` may
    /// create a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingSession`] or [`SessionError::Malformed`]
    /// when the message cannot be routed
    pub async fn dispatch(
        &self,
        body: &[u8],
        session_id: Option<&str>,
        credentials: Option<&VerifiedBearer>,
    ) -> Result<DispatchOutcome, SessionError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SessionError::ShuttingDown);
        }
        let message = IncomingMessage::parse(body).map_err(SessionError::Malformed)?;
        let (session_id, engine) = self.resolve(&message, session_id, credentials).await?;

        match message {
            IncomingMessage::Request(request) => {
                let auth = self.auth_context(&session_id).await;
                let response = engine.handle_request(request, &auth).await;
                Ok(DispatchOutcome::Response {
                    session_id,
                    response,
                })
            }
            IncomingMessage::Notification(notification) => {
                engine.handle_notification(&notification);
                Ok(DispatchOutcome::Accepted { session_id })
            }
            IncomingMessage::Response(response) => {
                engine.accept_response(response).await;
                Ok(DispatchOutcome::Accepted { session_id })
            }
        }
    }

    async fn resolve(
        &self,
        message: &IncomingMessage,
        session_id: Option<&str>,
        credentials: Option<&VerifiedBearer>,
    ) -> Result<(String, Arc<ProtocolEngine>), SessionError> {
        let Some(session_id) = session_id else {
            return match message {
                IncomingMessage::Request(request) if request.method == "initialize" => {
                    let session_id = Uuid::new_v4().to_string();
                    let engine = self.create_session(&session_id, credentials).await;
                    Ok((session_id, engine))
                }
                _ => Err(SessionError::MissingSession),
            };
        };

        {
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(session_id) {
                if let (Some(bearer), Some(owner)) = (credentials, session.subject.as_deref()) {
                    if bearer.subject != owner {
                        warn!(
                            session_id,
                            "Rejected bearer for a session owned by another user"
                        );
                        return Err(SessionError::SubjectMismatch);
                    }
                }
                session.last_accessed_at = Instant::now();
                if session.credentials.is_none() {
                    if let Some(bearer) = credentials {
                        session.credentials = Some(bearer.upstream_credentials.clone());
                        session.subject = Some(bearer.subject.clone());
                    }
                }
                return Ok((session_id.to_owned(), Arc::clone(&session.engine)));
            }
        }

        if matches!(message, IncomingMessage::Response(_)) {
            return Err(SessionError::NotFound(session_id.to_owned()));
        }

        info!(
            session_id,
            "Recovering unknown session id with a new session"
        );
        let engine = self.create_session(session_id, credentials).await;
        Ok((session_id.to_owned(), engine))
    }

    async fn create_session(
        &self,
        session_id: &str,
        credentials: Option<&VerifiedBearer>,
    ) -> Arc<ProtocolEngine> {
        let transport = Arc::new(SessionTransport::new(session_id, self.config.stream_capacity));
        let engine = Arc::new(ProtocolEngine::new(
            session_id,
            Arc::clone(&self.tools),
            Arc::clone(&transport),
        ));
        let now = Instant::now();
        let info = SessionInfo {
            engine: Arc::clone(&engine),
            transport,
            credentials: credentials.map(|b| b.upstream_credentials.clone()),
            subject: credentials.map(|b| b.subject.clone()),
            created_at: now,
            last_accessed_at: now,
        };

        let replaced = self
            .sessions
            .write()
            .await
            .insert(session_id.to_owned(), info);
        if let Some(previous) = replaced {
            // Concurrent creation for the same id: last writer keeps the slot
            debug!(session_id, "Replaced a concurrently created session");
            previous.close().await;
        }

        info!(
            session_id,
            authenticated = credentials.is_some(),
            "MCP session created"
        );
        engine
    }

    async fn auth_context(&self, session_id: &str) -> AuthContext {
        let snapshot = self
            .sessions
            .read()
            .await
            .get(session_id)
            .and_then(|s| s.credentials.clone());

        match snapshot {
            Some(credentials) => {
                let refresh = credentials
                    .refresh_token
                    .is_some()
                    .then(|| self.refresh_callback(session_id));
                AuthContext::new(Some(credentials.access_token), refresh)
            }
            None => AuthContext::default(),
        }
    }

    /// Callback renewing the session's credentials through the authorization server
    fn refresh_callback(&self, session_id: &str) -> RefreshCallback {
        let sessions = Arc::clone(&self.sessions);
        let refresher = Arc::clone(&self.refresher);
        let session_id = session_id.to_owned();

        Arc::new(move || {
            let sessions = Arc::clone(&sessions);
            let refresher = Arc::clone(&refresher);
            let session_id = session_id.clone();
            let refresh = async move {
                let refresh_token = sessions
                    .read()
                    .await
                    .get(&session_id)
                    .and_then(|s| s.credentials.as_ref())
                    .and_then(|c| c.refresh_token.clone())
                    .ok_or_else(|| {
                        AppError::auth_expired("Session has no upstream refresh token")
                    })?;

                let fresh = refresher.refresh_credentials(&refresh_token).await?;

                // Re-read after the await: the session may have been evicted or replaced
                let mut guard = sessions.write().await;
                match guard.get_mut(&session_id) {
                    Some(session) => session.credentials = Some(fresh.clone()),
                    None => {
                        debug!(session_id = %session_id, "Session gone before refresh completed");
                    }
                }
                drop(guard);
                info!(session_id = %session_id, "Session credentials refreshed");
                Ok::<_, AppError>(fresh.access_token)
            };
            Box::pin(refresh) as BoxFuture<'static, AppResult<String>>
        })
    }

    /// Attach an event stream to a live session
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for an unknown or closed session
    pub async fn open_stream(
        &self,
        session_id: &str,
    ) -> Result<broadcast::Receiver<String>, SessionError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SessionError::ShuttingDown);
        }
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_owned()))?;
        session.last_accessed_at = Instant::now();
        session
            .transport
            .subscribe()
            .ok_or_else(|| SessionError::NotFound(session_id.to_owned()))
    }

    /// Close and forget one session; false if it did not exist
    pub async fn close_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id);
        match removed {
            Some(session) => {
                session.close().await;
                info!(session_id, "MCP session closed by client");
                true
            }
            None => false,
        }
    }

    /// Evict sessions idle for at least the idle timeout, returning how many
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let idle_timeout = self.config.idle_timeout;
        let evicted: Vec<(String, SessionInfo)> = {
            let mut sessions = self.sessions.write().await;
            let expired: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| now.saturating_duration_since(s.last_accessed_at) >= idle_timeout)
                .map(|(id, _)| id.clone())
                .collect();
            expired
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|s| (id, s)))
                .collect()
        };

        for (session_id, session) in &evicted {
            session.close().await;
            debug!(session_id = %session_id, "Evicted idle session");
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted idle MCP sessions");
        }
        evicted.len()
    }

    /// Start the periodic idle sweep; a second call replaces nothing
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() || self.shut_down.load(Ordering::Acquire) {
            return;
        }
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.evict_idle(Instant::now()).await;
            }
        }));
    }

    /// Close every session and stop the sweep; idempotent
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        let drained: Vec<SessionInfo> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();
        for session in &drained {
            session.close().await;
        }
        info!(closed = drained.len(), "Session manager shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Number of live sessions
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether `session_id` is live
    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Current credential snapshot of a session
    pub async fn credentials(&self, session_id: &str) -> Option<UpstreamCredentials> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .and_then(|s| s.credentials.clone())
    }
}
