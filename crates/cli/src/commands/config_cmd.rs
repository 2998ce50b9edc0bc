//! `rolerag config`: configuration management commands.

use rolerag_config::AppConfig;
use std::path::Path;

pub fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    if config.provider.api_key.is_some() {
        config.provider.api_key = Some("[REDACTED]".into());
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", super::config_file(config_path).display());
}

pub fn init(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let target = super::config_file(config_path);
    if target.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", target.display()).into());
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, AppConfig::default_toml())?;
    println!("Wrote default config to {}", target.display());
    Ok(())
}
