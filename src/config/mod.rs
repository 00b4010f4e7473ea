// ABOUTME: Configuration module entry point
// ABOUTME: Re-exports the environment-driven server configuration types
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Environment variable parsing and typed configuration
pub mod environment;

pub use environment::{
    AuthConfig, Environment, IdentityProviderConfig, LearningApiConfig, ServerConfig,
    SessionSettings, DEVELOPMENT_REDIRECT_URIS,
};
