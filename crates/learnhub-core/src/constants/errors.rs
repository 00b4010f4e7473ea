// ABOUTME: Error code constants for JSON-RPC and MCP protocol errors
// ABOUTME: Defines standard error codes and corresponding error messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Error codes for JSON-RPC and MCP protocols

/// Invalid JSON was received
pub const ERROR_PARSE: i32 = -32700;

/// The JSON sent is not a valid request object
pub const ERROR_INVALID_REQUEST: i32 = -32600;

/// Method not found
pub const ERROR_METHOD_NOT_FOUND: i32 = -32601;

/// Invalid parameters
pub const ERROR_INVALID_PARAMS: i32 = -32602;

/// Server error - no usable session (missing or closed)
pub const ERROR_SESSION: i32 = -32000;
/// Server error - resource access failed
pub const ERROR_RESOURCE_ACCESS: i32 = -32001;
/// Server error - authentication failed
pub const ERROR_AUTHENTICATION: i32 = -32002;

/// Parse error message
pub const MSG_PARSE: &str = "Parse error";
/// Invalid request message
pub const MSG_INVALID_REQUEST: &str = "Invalid Request";
/// Method not found message
pub const MSG_METHOD_NOT_FOUND: &str = "Method not found";
/// Missing session message
pub const MSG_NO_SESSION: &str = "Bad Request: No valid session ID provided";
