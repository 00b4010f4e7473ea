// ABOUTME: Centralized resource container for dependency injection in the HTTP server
// ABOUTME: Wires configuration, the authorization server, the learning API, and the session manager
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Server Resources Module
//!
//! Built once at startup and shared with every route as `Arc<ServerResources>`.
//! Each instance owns its own stores, so tests can run isolated servers side
//! by side.

use std::sync::Arc;

use learnhub_core::errors::{AppError, AppResult};
use tokio::task::JoinHandle;

use super::session::{SessionManager, SessionManagerConfig};
use super::tool_handlers::ToolRegistry;
use crate::config::ServerConfig;
use crate::oauth2_client::{IdentityProvider, OAuth2Client};
use crate::oauth2_server::{AuthorizationServerConfig, OAuth2AuthorizationServer};
use crate::providers::{LearningApi, LearningApiClient};

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// OAuth 2.1 authorization server
    pub auth_server: Arc<OAuth2AuthorizationServer>,
    /// Session manager
    pub sessions: Arc<SessionManager>,
    /// Learning platform API client
    pub learning_api: Arc<dyn LearningApi>,
}

impl ServerResources {
    /// Wire resources around the given upstream collaborators
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        identity_provider: Arc<dyn IdentityProvider>,
        learning_api: Arc<dyn LearningApi>,
    ) -> Self {
        let auth_server = Arc::new(OAuth2AuthorizationServer::new(
            AuthorizationServerConfig::from_server_config(&config),
            identity_provider,
            config.auth.jwt_secret.as_bytes(),
            config.auth.bearer_ttl_secs,
        ));

        let tools = Arc::new(ToolRegistry::learning_tools(Arc::clone(&learning_api)));
        let sessions = Arc::new(SessionManager::new(
            tools,
            auth_server.clone(),
            SessionManagerConfig::from(&config.sessions),
        ));

        Self {
            config,
            auth_server,
            sessions,
            learning_api,
        }
    }

    /// Wire resources with the HTTP clients for the configured upstreams
    ///
    /// # Errors
    ///
    /// Returns an error if the learning API base URL is unusable
    pub fn from_config(config: Arc<ServerConfig>) -> AppResult<Self> {
        let identity_provider = Arc::new(OAuth2Client::new(
            config.identity_provider.clone(),
            config.oauth_redirect_url.clone(),
        ));
        let learning_api = Arc::new(
            LearningApiClient::new(&config.learning_api)
                .map_err(|e| AppError::config_invalid(e.to_string()))?,
        );
        Ok(Self::new(config, identity_provider, learning_api))
    }

    /// Start the pending-authorization and idle-session sweeps.
    ///
    /// The returned handle belongs to the pending sweep; the session sweep
    /// is stopped by [`SessionManager::shutdown`].
    #[must_use]
    pub fn start_background_tasks(&self) -> JoinHandle<()> {
        self.sessions.spawn_sweeper();
        self.auth_server.spawn_pending_sweeper()
    }
}
