// ABOUTME: JSON-RPC 2.0 message types used by the MCP session endpoint
// ABOUTME: Provides request, response, and error types plus inbound message classification
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # JSON-RPC 2.0 Foundation
//!
//! Shared request, response, and error types for the MCP session endpoint.
//! A single inbound body is classified into a request, a notification, or a
//! response to a server-initiated request (for example a sampling answer).
//!
//! ```rust
//! use learnhub_mcp_server::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
//! # use serde_json::json;
//!
//! let request = JsonRpcRequest::with_id("tools/list", None, json!(1));
//! let response = JsonRpcResponse::success(request.id.clone(), json!({"tools": []}));
//! assert!(response.is_success());
//! ```

use learnhub_core::constants::errors::{
    ERROR_INVALID_REQUEST, ERROR_PARSE, MSG_INVALID_REQUEST, MSG_PARSE,
};
use learnhub_core::constants::protocol::JSONRPC_VERSION;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Method name to invoke
    pub method: String,
    /// Optional parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request identifier; absent for notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 Response
///
/// Exactly one of `result` or `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Result of the method call (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error information (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier for correlation
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 Error Object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Additional error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new request with a specific ID
    #[must_use]
    pub fn with_id(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// True when no response is expected
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

impl JsonRpcResponse {
    /// Create a success response
    #[must_use]
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    #[must_use]
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self::from_error(id, JsonRpcError::new(code, message))
    }

    /// Create an error response from an error object
    #[must_use]
    pub fn from_error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Check if this is a success response
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }
}

impl JsonRpcError {
    /// Create a new error
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error with data
    #[must_use]
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// A single inbound JSON-RPC message
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// Call expecting a response
    Request(JsonRpcRequest),
    /// Call without an id
    Notification(JsonRpcRequest),
    /// Client's answer to a server-initiated request
    Response(JsonRpcResponse),
}

impl IncomingMessage {
    /// Classify a raw body.
    ///
    /// # Errors
    ///
    /// Returns a parse error for invalid JSON and an invalid-request error
    /// for JSON that is not a single JSON-RPC 2.0 message.
    pub fn parse(body: &[u8]) -> Result<Self, JsonRpcError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| JsonRpcError::with_data(ERROR_PARSE, MSG_PARSE, e.to_string().into()))?;

        let invalid = |reason: &str| {
            JsonRpcError::with_data(ERROR_INVALID_REQUEST, MSG_INVALID_REQUEST, reason.into())
        };

        let Some(object) = value.as_object() else {
            return Err(invalid("expected a single JSON-RPC object"));
        };
        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(invalid("jsonrpc must be \"2.0\""));
        }

        if object.contains_key("method") {
            let request: JsonRpcRequest =
                serde_json::from_value(value).map_err(|e| invalid(&e.to_string()))?;
            return Ok(if request.is_notification() {
                Self::Notification(request)
            } else {
                Self::Request(request)
            });
        }

        if object.contains_key("result") || object.contains_key("error") {
            let response: JsonRpcResponse =
                serde_json::from_value(value).map_err(|e| invalid(&e.to_string()))?;
            return Ok(Self::Response(response));
        }

        Err(invalid("message is neither a request nor a response"))
    }
}
