pub mod ask;
pub mod config_cmd;
pub mod doctor;
pub mod reembed;
pub mod sections;
pub mod serve;

use rolerag_config::{AppConfig, ConfigError};
use rolerag_core::RoleSet;
use std::path::{Path, PathBuf};

/// The config file in use: `--config` if given, else the default location.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(&config_file(path))
}

/// Parse `--roles`, falling back to the configured defaults.
pub fn roles_or_default(
    roles: Option<&str>,
    config: &AppConfig,
) -> Result<RoleSet, Box<dyn std::error::Error>> {
    match roles {
        Some(raw) => Ok(raw.parse::<RoleSet>()?),
        None => Ok(config.roles.default_roles.iter().copied().collect()),
    }
}
