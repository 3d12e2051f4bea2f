// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plugvisor run` command implementation.
//!
//! Creates one instance, initializes and starts it, then waits for a
//! shutdown signal or for the instance to leave `Running` on its own.
//! Every instance is disposed before returning, so no plugin process
//! outlives an orderly exit.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use plugvisor_config::PlugvisorConfig;
use plugvisor_core::{InstanceStatus, PlugvisorError};
use plugvisor_plugin::ModuleRegistry;
use plugvisor_runtime::{PluginInstanceRegistry, RegistrySettings};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commands::{find_plugin, load_catalog, validator_for};
use crate::shutdown;

const STATUS_POLL: Duration = Duration::from_millis(200);

pub struct RunOptions {
    pub plugin_id: String,
    pub workspace_id: String,
    /// Configuration document; schema defaults are used when absent.
    pub config_file: Option<PathBuf>,
    /// Validate the configuration even if `validate_on_create` is off.
    pub validate: bool,
}

pub async fn run_instance(config: &PlugvisorConfig, options: RunOptions) -> Result<ExitCode, PlugvisorError> {
    let cancel = shutdown::install_signal_handler();

    let catalog = load_catalog(config).await?;
    let validator = validator_for(config, &catalog);
    let definition = find_plugin(&catalog, &options.plugin_id)?;

    let document = match &options.config_file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PlugvisorError::io(path.display(), e))?,
        None => validator.default_configuration(&definition).to_string(),
    };

    let registry = PluginInstanceRegistry::new(
        catalog,
        validator,
        Arc::new(ModuleRegistry::with_builtins()),
        RegistrySettings::from(config),
    );

    let outcome = supervise(&registry, &options, &document, cancel).await;
    registry.shutdown_all().await;
    outcome
}

async fn supervise(
    registry: &PluginInstanceRegistry,
    options: &RunOptions,
    document: &str,
    cancel: CancellationToken,
) -> Result<ExitCode, PlugvisorError> {
    let info = if options.validate {
        registry
            .create_validated(&options.plugin_id, &options.workspace_id, document)
            .await?
    } else {
        registry
            .create(&options.plugin_id, &options.workspace_id, document)
            .await?
    };
    let instance_id = info.instance_id;

    registry.initialize(&instance_id).await?;
    registry.start(&instance_id).await?;
    println!("{instance_id}");

    tokio::select! {
        _ = cancel.cancelled() => {
            info!(instance_id = %instance_id, "shutdown requested");
            return Ok(ExitCode::SUCCESS);
        }
        _ = registry.wait_until_not_running(&instance_id, STATUS_POLL) => {}
    }

    let Some(info) = registry.info(&instance_id).await else {
        return Ok(ExitCode::SUCCESS);
    };
    info!(instance_id = %instance_id, status = %info.status, "plugin instance is no longer running");
    if info.status == InstanceStatus::Error {
        eprintln!(
            "{}: {}",
            info.plugin_id,
            info.last_error.as_deref().unwrap_or("instance failed")
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
