//! CLI subcommands.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use banter_client::{fetch_descriptors, http_client, ClientConfig, ClientRegistry};
use banter_session::GenerationSettings;

pub mod ask;
pub mod chat;
mod exchange;
pub mod services;

/// Generation knobs shared by `ask` and `chat`.
#[derive(Debug, Args)]
pub struct GenerationArgs {
    /// Service that hosts the generation endpoint
    #[arg(long, default_value = "textInference")]
    pub service: String,

    /// Generation endpoint name within the service
    #[arg(long, default_value = "inference")]
    pub endpoint: String,

    /// Attention mode forwarded to the provider
    #[arg(long, default_value = "balanced")]
    pub mode: String,

    /// System prompt
    #[arg(long, default_value = "")]
    pub system: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.7)]
    pub temperature: f32,

    /// Response length cap
    #[arg(long, default_value_t = 1024)]
    pub max_tokens: u32,

    /// Stop marker, may be given multiple times
    #[arg(long = "stop")]
    pub stop_markers: Vec<String>,
}

impl GenerationArgs {
    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            mode: self.mode.clone(),
            system_prompt: self.system.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop_markers: self.stop_markers.clone(),
            ..Default::default()
        }
    }
}

/// Merge CLI overrides onto the environment-derived configuration.
pub fn client_config(host: Option<String>, port: Option<u16>) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    config
}

/// Run discovery and build the client registry.
pub async fn connect(config: &ClientConfig) -> anyhow::Result<Arc<ClientRegistry>> {
    let http = http_client(config).context("failed to build HTTP client")?;

    let descriptors = fetch_descriptors(&http, &config.discovery_origin())
        .await
        .with_context(|| {
            format!(
                "no inference server reachable at {}",
                config.discovery_origin()
            )
        })?;

    let registry = ClientRegistry::build(http, &config.host, &descriptors)?;
    Ok(Arc::new(registry))
}
