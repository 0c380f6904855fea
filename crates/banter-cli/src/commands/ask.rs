//! `banter ask` - one prompt, streamed answer.

use std::sync::Arc;

use banter_session::{RegistryTransport, SessionController};

use super::{exchange, GenerationArgs};
use banter_client::ClientConfig;

pub async fn run(
    config: &ClientConfig,
    prompt: &str,
    generation: GenerationArgs,
) -> anyhow::Result<()> {
    let registry = super::connect(config).await?;
    let transport = RegistryTransport::new(registry, &generation.service, &generation.endpoint);
    let controller = Arc::new(SessionController::new(transport, generation.settings()));

    exchange::run(&controller, Some(prompt.to_string())).await
}
