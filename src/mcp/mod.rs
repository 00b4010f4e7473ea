// ABOUTME: Model Context Protocol (MCP) implementation for AI assistant integration
// ABOUTME: Session management, protocol engine, tool dispatch, and server-initiated sampling
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Static resources and prompt templates
pub mod catalog;
/// Per-session JSON-RPC protocol engine
pub mod protocol;
/// Shared server resources
pub mod resources;
/// Server-initiated sampling requests
pub mod sampling_peer;
/// Session map, recovery, refresh, and eviction
pub mod session;
/// Tool dispatch table and refresh-and-retry execution
pub mod tool_handlers;
/// Per-session outbound stream
pub mod transport;

pub use protocol::ProtocolEngine;
pub use resources::ServerResources;
pub use session::{DispatchOutcome, SessionError, SessionManager, SessionManagerConfig};
pub use tool_handlers::{AuthContext, RefreshCallback, ToolError, ToolRegistry};
