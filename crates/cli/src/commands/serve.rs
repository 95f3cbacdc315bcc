//! `schoolpilot serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;
    super::require_api_key(&config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("SchoolPilot Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.model);
    println!("   Corpus:    {}", config.knowledge.corpus_path.display());
    println!(
        "   Messenger: {}",
        if config.messenger.enabled { "enabled" } else { "disabled" }
    );

    schoolpilot_gateway::start(config).await?;

    Ok(())
}
