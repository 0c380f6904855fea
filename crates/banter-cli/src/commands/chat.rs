//! `banter chat` - interactive session.

use std::io::{BufRead, Write};
use std::sync::Arc;

use banter_session::{RegistryTransport, SessionController};

use super::{exchange, GenerationArgs};
use banter_client::ClientConfig;

pub async fn run(config: &ClientConfig, generation: GenerationArgs) -> anyhow::Result<()> {
    let registry = super::connect(config).await?;
    let transport = RegistryTransport::new(registry, &generation.service, &generation.endpoint);
    let controller = Arc::new(SessionController::new(transport, generation.settings()));

    println!("Connected. /reload repeats the last prompt, /quit exits, Ctrl-C stops a response.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" => break,
            "/reload" => exchange::run(&controller, None).await?,
            prompt => exchange::run(&controller, Some(prompt.to_string())).await?,
        }
    }

    controller.store().clear();
    Ok(())
}
