// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog and configuration subcommands: `discover`, `show`, `defaults`,
//! and `validate`.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use plugvisor_config::PlugvisorConfig;
use plugvisor_core::PlugvisorError;
use plugvisor_plugin::{ConfigurationValidator, PluginCatalog, PluginDefinition};

/// Build a catalog from the configured scan directories and run discovery
/// on the blocking pool.
pub async fn load_catalog(config: &PlugvisorConfig) -> Result<Arc<PluginCatalog>, PlugvisorError> {
    let catalog = Arc::new(PluginCatalog::new(config.plugins.scan_directories.clone()));
    let scanner = Arc::clone(&catalog);
    tokio::task::spawn_blocking(move || scanner.discover_configured())
        .await
        .map_err(|e| PlugvisorError::Internal(format!("plugin discovery task failed: {e}")))?;
    Ok(catalog)
}

pub fn validator_for(config: &PlugvisorConfig, catalog: &Arc<PluginCatalog>) -> Arc<ConfigurationValidator> {
    Arc::new(ConfigurationValidator::new(
        Arc::clone(catalog),
        config.plugins.temp_config_dir.clone(),
    ))
}

pub fn find_plugin(catalog: &PluginCatalog, plugin_id: &str) -> Result<PluginDefinition, PlugvisorError> {
    catalog
        .lookup_by_id(plugin_id)
        .ok_or_else(|| PlugvisorError::plugin_not_found(plugin_id))
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String, PlugvisorError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PlugvisorError::Internal(format!("failed to serialize output: {e}")))
}

/// `plugvisor discover`
pub async fn discover(config: &PlugvisorConfig, json: bool) -> Result<ExitCode, PlugvisorError> {
    let catalog = load_catalog(config).await?;
    let definitions = catalog.definitions();

    if json {
        println!("{}", to_pretty_json(&*definitions)?);
        return Ok(ExitCode::SUCCESS);
    }

    if definitions.is_empty() {
        eprintln!(
            "no plugins found in: {}",
            config.plugins.scan_directories.join(", ")
        );
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<32} {:<24} {:<10} KIND", "ID", "NAME", "VERSION");
    for def in definitions.iter() {
        let version = if def.version.is_empty() { "-" } else { def.version.as_str() };
        println!(
            "{:<32} {:<24} {:<10} {}",
            def.id, def.name, version, def.execution_kind
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// `plugvisor show <plugin-id>`
pub async fn show(config: &PlugvisorConfig, plugin_id: &str) -> Result<ExitCode, PlugvisorError> {
    let catalog = load_catalog(config).await?;
    let definition = find_plugin(&catalog, plugin_id)?;
    println!("{}", to_pretty_json(&definition)?);
    Ok(ExitCode::SUCCESS)
}

/// `plugvisor defaults <plugin-id>`
pub async fn defaults(config: &PlugvisorConfig, plugin_id: &str) -> Result<ExitCode, PlugvisorError> {
    let catalog = load_catalog(config).await?;
    let definition = find_plugin(&catalog, plugin_id)?;
    let defaults = validator_for(config, &catalog).default_configuration(&definition);
    println!("{}", to_pretty_json(&defaults)?);
    Ok(ExitCode::SUCCESS)
}

/// `plugvisor validate <plugin-id> <config-file>`
///
/// Exits non-zero when the document is invalid.
pub async fn validate(
    config: &PlugvisorConfig,
    plugin_id: &str,
    config_file: &Path,
) -> Result<ExitCode, PlugvisorError> {
    let catalog = load_catalog(config).await?;
    let definition = find_plugin(&catalog, plugin_id)?;
    let document = tokio::fs::read_to_string(config_file)
        .await
        .map_err(|e| PlugvisorError::io(config_file.display(), e))?;

    let result = validator_for(config, &catalog).validate(&definition, &document);
    if result.is_valid {
        println!("{}: configuration is valid", definition.id);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}: {}", definition.id, result.error_message);
    for error in &result.errors {
        println!("  - {error}");
    }
    Ok(ExitCode::FAILURE)
}
