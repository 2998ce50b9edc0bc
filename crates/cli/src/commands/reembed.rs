//! `rolerag reembed`: refresh the vectors in a snapshot file.

use rolerag_knowledge::reembed_file;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    input: &Path,
    output: &Path,
    field: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = rolerag_providers::build_from_config(&config)?.require_default()?;

    let summary = reembed_file(
        provider.as_ref(),
        &config.provider.embed_model,
        input,
        output,
        field,
    )
    .await?;

    println!(
        "Embedded {} record(s), skipped {} without `{field}` -> {}",
        summary.embedded,
        summary.skipped,
        output.display()
    );
    Ok(())
}
