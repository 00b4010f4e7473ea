// ABOUTME: Utility module entry point
// ABOUTME: Shared helpers that do not belong to a single component
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// HTTP client constructors
pub mod http_client;
