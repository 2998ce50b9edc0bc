//! `rolerag doctor`: diagnose configuration, provider and snapshot.

use rolerag_knowledge::KnowledgeLoader;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("rolerag doctor");
    println!("==============\n");

    let mut issues = 0;

    let config_file = super::config_file(config_path);
    if !config_file.exists() {
        println!("  ⚠️  No config file at {} (using defaults)", config_file.display());
    }
    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue found. Fix the config and run again.");
            return Ok(());
        }
    };

    if config.provider.kind != "ollama" && !config.has_api_key() {
        println!("  ⚠️  No API key for provider '{}' (set ROLERAG_API_KEY)", config.provider.kind);
        issues += 1;
    }

    let provider = match rolerag_providers::build_from_config(&config)
        .and_then(|router| router.require_default())
    {
        Ok(provider) => provider,
        Err(e) => {
            println!("  ❌ Provider not usable: {e}");
            println!("\n  ⚠️  {} issue(s) found.", issues + 1);
            return Ok(());
        }
    };
    match provider.health_check().await {
        Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
        Ok(false) => {
            println!("  ❌ Provider '{}' reported unhealthy", provider.name());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
            issues += 1;
        }
    }

    let directory = match rolerag_directory::open(&config.directory).await {
        Ok(directory) => {
            println!("  ✅ Directory '{}' open", directory.name());
            directory
        }
        Err(e) => {
            println!("  ❌ Directory unavailable: {e}");
            println!("\n  ⚠️  {} issue(s) found.", issues + 1);
            return Ok(());
        }
    };

    let loader = KnowledgeLoader::new(
        config.knowledge.clone(),
        config.provider.embed_model.clone(),
        provider,
        directory,
    );
    match loader.load().await {
        Ok(snapshot) => println!(
            "  ✅ Snapshot loaded: {} policies, {} FAQs, {} sections (dimension {})",
            snapshot.policies.len(),
            snapshot.faqs.len(),
            snapshot.section_vectors.len(),
            snapshot
                .dimension()
                .map_or_else(|| "n/a".to_string(), |d| d.to_string())
        ),
        Err(e) => {
            println!("  ❌ Snapshot failed to load: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
