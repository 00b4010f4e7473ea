// ABOUTME: Error handling re-exports from the core crate
// ABOUTME: Keeps `crate::errors::AppError` paths stable for the server modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Unified Error Handling
//!
//! The error types live in `learnhub-core` so they compile once; this module
//! re-exports them for use inside the server crate.

pub use learnhub_core::errors::*;
