// ABOUTME: Per-session MCP protocol engine answering JSON-RPC requests
// ABOUTME: Routes initialize, ping, tools, resources, and prompts, and accepts sampling responses
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # MCP Protocol Engine
//!
//! One engine exists per session. It owns the session's sampling peer and
//! the client's declared capabilities; tool execution is delegated to the
//! shared [`ToolRegistry`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use learnhub_core::constants::errors::{
    ERROR_AUTHENTICATION, ERROR_INVALID_PARAMS, ERROR_METHOD_NOT_FOUND,
    ERROR_RESOURCE_ACCESS, ERROR_SESSION, MSG_METHOD_NOT_FOUND,
};
use learnhub_core::constants::protocol::{
    MCP_PROTOCOL_VERSION, SERVER_NAME, SUPPORTED_PROTOCOL_VERSIONS,
};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::catalog;
use super::sampling_peer::SamplingPeer;
use super::tool_handlers::{AuthContext, ToolError, ToolRegistry};
use super::transport::SessionTransport;
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::logging::AppLogger;

/// MCP protocol engine bound to one session
pub struct ProtocolEngine {
    session_id: String,
    tools: Arc<ToolRegistry>,
    sampling: Arc<SamplingPeer>,
    supports_sampling: AtomicBool,
    closed: AtomicBool,
}

impl ProtocolEngine {
    /// Create an engine whose sampling requests travel over `transport`
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        tools: Arc<ToolRegistry>,
        transport: Arc<SessionTransport>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            tools,
            sampling: Arc::new(SamplingPeer::new(transport)),
            supports_sampling: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Answer a request
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        auth: &AuthContext,
    ) -> JsonRpcResponse {
        let id = request.id.clone();
        if self.closed.load(Ordering::Acquire) {
            return JsonRpcResponse::error(id, ERROR_SESSION, "Session is closed");
        }

        debug!(session_id = %self.session_id, method = %request.method, "Handling MCP request");
        let params = request.params.unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, &params),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                JsonRpcResponse::success(id, json!({ "tools": self.tools.schemas() }))
            }
            "tools/call" => self.handle_tools_call(id, &params, auth).await,
            "resources/list" => JsonRpcResponse::success(id, catalog::list_resources()),
            "resources/read" => Self::handle_resources_read(id, &params),
            "prompts/list" => JsonRpcResponse::success(id, catalog::list_prompts()),
            "prompts/get" => Self::handle_prompts_get(id, &params),
            method => {
                debug!(session_id = %self.session_id, method, "Unknown MCP method");
                JsonRpcResponse::error(
                    id,
                    ERROR_METHOD_NOT_FOUND,
                    format!("{MSG_METHOD_NOT_FOUND}: {method}"),
                )
            }
        }
    }

    /// Absorb a notification
    pub fn handle_notification(&self, notification: &JsonRpcRequest) {
        match notification.method.as_str() {
            "notifications/initialized" => {
                info!(session_id = %self.session_id, "Client initialization complete");
            }
            "notifications/cancelled" => {
                debug!(session_id = %self.session_id, "Client cancelled a request; in-flight work runs to completion");
            }
            other => debug!(session_id = %self.session_id, method = other, "Ignoring notification"),
        }
    }

    /// Accept the client's answer to a server-initiated request.
    ///
    /// Returns false when no request was waiting for it.
    pub async fn accept_response(&self, response: JsonRpcResponse) -> bool {
        let handled = self.sampling.handle_response(response).await;
        if !handled {
            warn!(session_id = %self.session_id, "Discarded response with no matching request");
        }
        handled
    }

    /// Stop serving and fail outstanding sampling requests; idempotent
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sampling.cancel_all_pending().await;
    }

    fn handle_initialize(&self, id: Option<Value>, params: &Value) -> JsonRpcResponse {
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let negotiated = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(MCP_PROTOCOL_VERSION)
            .to_owned();
        let client_name = params
            .pointer("/clientInfo/name")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let supports_sampling = params.pointer("/capabilities/sampling").is_some();

        info!(
            session_id = %self.session_id,
            client = client_name.as_deref().unwrap_or("unknown"),
            protocol_version = %negotiated,
            supports_sampling,
            "MCP session initialized"
        );

        self.supports_sampling
            .store(supports_sampling, Ordering::Release);

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": negotiated,
                "capabilities": {
                    "tools": { "listChanged": false },
                    "resources": { "subscribe": false, "listChanged": false },
                    "prompts": { "listChanged": false },
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "instructions": "Manage LearnHub courses and lessons. Read learnhub://guidelines/* before authoring content.",
            }),
        )
    }

    async fn handle_tools_call(
        &self,
        id: Option<Value>,
        params: &Value,
        auth: &AuthContext,
    ) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, ERROR_INVALID_PARAMS, "Missing tool name");
        };
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return JsonRpcResponse::error(
                    id,
                    ERROR_INVALID_PARAMS,
                    "arguments must be an object",
                );
            }
        };

        let sampling = self
            .supports_sampling
            .load(Ordering::Acquire)
            .then(|| Arc::clone(&self.sampling));

        let started = Instant::now();
        let outcome = self.tools.execute(name, arguments, auth, sampling).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        AppLogger::log_mcp_tool_call(&self.session_id, name, outcome.is_ok(), duration_ms);

        match outcome {
            Ok(value) => {
                let text =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                JsonRpcResponse::success(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": text }],
                        "structuredContent": value,
                        "isError": false,
                    }),
                )
            }
            Err(e @ (ToolError::UnknownTool(_) | ToolError::InvalidArguments(_))) => {
                JsonRpcResponse::error(id, ERROR_INVALID_PARAMS, e.to_string())
            }
            Err(e @ (ToolError::AuthenticationRequired | ToolError::AuthenticationFailed(_))) => {
                warn!(session_id = %self.session_id, tool = name, "Tool call not authenticated: {e}");
                JsonRpcResponse::error(id, ERROR_AUTHENTICATION, e.to_string())
            }
            Err(e @ (ToolError::Api(_) | ToolError::Sampling(_))) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": e.to_string() }],
                    "isError": true,
                }),
            ),
        }
    }

    fn handle_resources_read(id: Option<Value>, params: &Value) -> JsonRpcResponse {
        let Some(uri) = params.get("uri").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, ERROR_INVALID_PARAMS, "Missing uri parameter");
        };
        catalog::read_resource(uri).map_or_else(
            || JsonRpcResponse::error(
                id.clone(),
                ERROR_RESOURCE_ACCESS,
                format!("Resource not found: {uri}"),
            ),
            |contents| JsonRpcResponse::success(id.clone(), contents),
        )
    }

    fn handle_prompts_get(id: Option<Value>, params: &Value) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, ERROR_INVALID_PARAMS, "Missing prompt name");
        };
        let empty = Map::new();
        let arguments = params
            .get("arguments")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        match catalog::get_prompt(name, arguments) {
            Ok(prompt) => JsonRpcResponse::success(id, prompt),
            Err(message) => JsonRpcResponse::error(id, ERROR_INVALID_PARAMS, message),
        }
    }
}
