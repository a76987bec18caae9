//! Daemon entry point for the enrichment webhook.
//!
//! Loads configuration from the environment, builds the outbound clients
//! once, and serves the webhook over HTTP. A missing required credential
//! stops the process before the port is bound.

mod clients;
mod config;

use enrich_webhook::{WebhookServer, WebhookServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::clients::build_pipeline;
use crate::config::HookConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HookConfig::from_args().inspect_err(|err| {
        error!("refusing to start: {err}");
    })?;
    info!("initializing service clients");
    let pipeline = build_pipeline(&config).await.inspect_err(|err| {
        error!("refusing to start: {err}");
    })?;
    info!("service clients initialized");

    let server_config =
        WebhookServerConfig::new(config.listen_addr).with_max_body_bytes(config.max_body_bytes);
    WebhookServer::new(pipeline, server_config).serve().await
}
