// ABOUTME: HTTP middleware for bearer authentication, session headers, and CORS
// ABOUTME: Layers applied around the MCP session endpoint and the public routes

/// Bearer token verification
pub mod auth;
/// CORS configuration
pub mod cors;
/// Session id response decorator
pub mod session_headers;

// Authentication middleware
pub use auth::{challenge, extract_bearer, require_bearer};

// CORS configuration
pub use cors::setup_cors;

// Session header decoration
pub use session_headers::{apply_session_headers, session_headers, SessionId};
