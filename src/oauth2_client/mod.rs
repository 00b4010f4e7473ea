// ABOUTME: OAuth 2.0 client for the upstream identity provider
// ABOUTME: Exposes the IdentityProvider capability and its HTTP implementation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # OAuth 2.0 Client Module
//!
//! The server acts as an OAuth 2.0 client of the `LearnHub` identity
//! provider on behalf of each end user. The authorization server only sees
//! the [`IdentityProvider`] trait, so tests can swap in an in-process fake.

/// Upstream identity provider client
pub mod client;

pub use client::{
    profile_from_json, IdentityProvider, OAuth2Client, UpstreamCredentials, UpstreamProfile,
};
