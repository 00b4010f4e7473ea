// ABOUTME: Learning platform integration exposed to tool handlers
// ABOUTME: Defines the LearningApi trait, its HTTP client, and the API error type
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Learning API error type
pub mod errors;
/// Learning API trait and `reqwest` client
pub mod learning_api;

pub use errors::LearningApiError;
pub use learning_api::{LearningApi, LearningApiClient, Page};
