// ABOUTME: Server binary for the LearnHub MCP server
// ABOUTME: Loads configuration from the environment, initializes logging, and serves HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # `LearnHub` MCP Server Binary

use anyhow::Result;
use clap::Parser;
use learnhub_mcp_server::{config::ServerConfig, logging, server};
use tracing::{error, info};

/// Command line arguments
#[derive(Parser)]
#[command(name = "learnhub-mcp-server")]
#[command(about = "LearnHub MCP Server - OAuth 2.1 and MCP sessions for the LearnHub learning API")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    info!(
        environment = %config.environment,
        issuer = %config.base_url,
        learning_api = %config.learning_api.base_url,
        provider = %config.identity_provider.provider,
        "Starting LearnHub MCP Server"
    );
    display_available_endpoints(&config);

    if let Err(e) = server::run(config).await {
        error!("Server error: {e:#}");
        return Err(e);
    }
    Ok(())
}

/// Log the public endpoints
#[allow(clippy::cognitive_complexity)]
fn display_available_endpoints(config: &ServerConfig) {
    let base = &config.base_url;
    info!("=== Available API Endpoints ===");
    info!("   MCP Session:       POST/GET/DELETE {base}/mcp");
    info!("   Discovery:         GET  {base}/.well-known/oauth-authorization-server");
    info!("   Resource Metadata: GET  {base}/.well-known/oauth-protected-resource");
    info!("   Registration:      POST {base}/oauth/register");
    info!("   Authorization:     GET  {base}/oauth/authorize");
    info!("   Upstream Callback: GET  {}", config.oauth_redirect_url);
    info!("   Token:             POST {base}/oauth/token");
    info!("   Health:            GET  {base}/health");
    info!("=== End of Endpoint List ===");
}
