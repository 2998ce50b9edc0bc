//! `rolerag sections`: print the hierarchy a set of roles can see.
//!
//! Reads the directory directly; no embeddings are needed.

use rolerag_knowledge::SectionForest;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    roles: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let roles = super::roles_or_default(roles.as_deref(), &config)?;

    let directory = rolerag_directory::open(&config.directory).await?;
    let forest = SectionForest::new(directory.sections().await?)?;
    let role_names = directory.role_names().await?;
    let rendered = forest.render(&roles, &role_names);

    if rendered.text.is_empty() {
        println!("No sections visible to roles {roles}");
    } else {
        print!("{}", rendered.text);
    }
    Ok(())
}
