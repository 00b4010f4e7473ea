// ABOUTME: Core types and constants for the LearnHub MCP server
// ABOUTME: Foundation crate with error handling and domain constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # `LearnHub` Core
//!
//! Foundation crate providing shared error types and constants for the
//! `LearnHub` MCP server. This crate is designed to change infrequently,
//! enabling incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError`, `ErrorCode`, and upstream errors
//! - **constants**: OAuth, session, and protocol constants

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;
