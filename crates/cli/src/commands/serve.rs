//! `rolerag serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("rolerag gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.provider.kind, config.provider.chat_model);
    println!("   Directory: {} ({})", config.directory.backend, config.directory.path);
    println!("   Reload:    {}", if config.gateway.enable_reload { "enabled" } else { "disabled" });

    rolerag_gateway::start(config).await?;

    Ok(())
}
