//! `banter services` - list what the server advertises.

use banter_client::ClientConfig;

pub async fn run(config: &ClientConfig) -> anyhow::Result<()> {
    let registry = super::connect(config).await?;

    for (service, endpoints) in registry.services() {
        println!("{service}");
        for (name, route) in endpoints {
            println!("  {:<20} {} {}{}", name, route.method, route.origin, route.path);
        }
    }

    Ok(())
}
