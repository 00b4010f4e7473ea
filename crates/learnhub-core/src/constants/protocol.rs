// ABOUTME: MCP protocol constants and session lifetimes
// ABOUTME: Protocol version, server identity, session headers, and sweep timings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! MCP protocol constants

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version advertised by the server
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol versions accepted in `initialize`, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Server name reported in `initialize`
pub const SERVER_NAME: &str = "learnhub-mcp-server";

/// Session id header, lowercase wire form
pub const SESSION_ID_HEADER_LOWER: &str = "mcp-session-id";

/// Idle time after which a session is evicted
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 3600;

/// Interval of the idle-session sweep
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 300;

/// Capacity of the per-session outbound message channel
pub const SESSION_STREAM_CAPACITY: usize = 64;

/// Time a sampling request waits for the client's answer
pub const SAMPLING_TIMEOUT_SECS: u64 = 30;

/// Keep-alive interval for the session event stream
pub const STREAM_KEEPALIVE_SECS: u64 = 15;
