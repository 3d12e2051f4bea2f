// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete host stack (configuration, catalog,
//! validator, module registry and instance registry) over a temp directory
//! that is removed on drop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugvisor_config::{HostConfig, PluginsConfig, PlugvisorConfig};
use plugvisor_core::PlugvisorError;
use plugvisor_plugin::{ConfigurationValidator, ModuleRegistry, PluginCatalog, PluginFactory};
use plugvisor_runtime::{PluginInstanceRegistry, RegistrySettings};
use serde_json::Value;

enum ManifestFile {
    Json(Value),
    Toml(String),
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    manifests: Vec<(String, ManifestFile)>,
    modules: ModuleRegistry,
    stop_timeout_secs: u64,
    validate_on_create: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            manifests: Vec::new(),
            modules: ModuleRegistry::with_builtins(),
            stop_timeout_secs: 2,
            validate_on_create: false,
        }
    }

    /// Add a `manifest.json` in its own directory under the plugin folder.
    pub fn with_manifest(mut self, dir: &str, manifest: Value) -> Self {
        self.manifests.push((dir.to_string(), ManifestFile::Json(manifest)));
        self
    }

    /// Add a `plugin.toml` in its own directory under the plugin folder.
    pub fn with_toml_manifest(mut self, dir: &str, manifest: &str) -> Self {
        self.manifests
            .push((dir.to_string(), ManifestFile::Toml(manifest.to_string())));
        self
    }

    /// Register an extra in-process plugin factory.
    pub fn with_module(
        mut self,
        module: &str,
        entry_type: &str,
        factory: impl PluginFactory + 'static,
    ) -> Self {
        self.modules.register(module, entry_type, factory);
        self
    }

    pub fn with_stop_timeout(mut self, secs: u64) -> Self {
        self.stop_timeout_secs = secs;
        self
    }

    pub fn with_validate_on_create(mut self, enabled: bool) -> Self {
        self.validate_on_create = enabled;
        self
    }

    /// Build the harness: write manifests, run discovery, wire the registry.
    pub fn build(self) -> Result<TestHarness, PlugvisorError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| PlugvisorError::io("failed to create harness directory", e))?;
        let root = temp_dir.path();
        let plugins_dir = root.join("plugins");
        std::fs::create_dir_all(&plugins_dir)
            .map_err(|e| PlugvisorError::io(plugins_dir.display(), e))?;

        for (dir, manifest) in &self.manifests {
            let dir = plugins_dir.join(dir);
            match manifest {
                ManifestFile::Json(value) => write_json_manifest(&dir, value)?,
                ManifestFile::Toml(text) => {
                    write_file(&dir, plugvisor_plugin::manifest::TOML_MANIFEST, text)?;
                }
            }
        }

        let config = PlugvisorConfig {
            host: HostConfig {
                log_level: "debug".to_string(),
                workspace_root: root.join("workspaces"),
            },
            plugins: PluginsConfig {
                scan_directories: vec![plugins_dir.display().to_string()],
                temp_config_dir: root.join("configs"),
                stop_timeout_secs: self.stop_timeout_secs,
                validate_on_create: self.validate_on_create,
            },
        };

        let catalog = Arc::new(PluginCatalog::new(config.plugins.scan_directories.clone()));
        let discovered = catalog.discover_configured();
        tracing::debug!(count = discovered.len(), "test harness discovered plugins");

        let validator = Arc::new(ConfigurationValidator::new(
            Arc::clone(&catalog),
            config.plugins.temp_config_dir.clone(),
        ));
        let registry = Arc::new(PluginInstanceRegistry::new(
            Arc::clone(&catalog),
            Arc::clone(&validator),
            Arc::new(self.modules),
            RegistrySettings::from(&config),
        ));

        Ok(TestHarness {
            config,
            catalog,
            validator,
            registry,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete, isolated host stack.
pub struct TestHarness {
    /// Host configuration pointing at the temp directories.
    pub config: PlugvisorConfig,
    /// Catalog over the harness plugin folder, already discovered.
    pub catalog: Arc<PluginCatalog>,
    pub validator: Arc<ConfigurationValidator>,
    pub registry: Arc<PluginInstanceRegistry>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn root(&self) -> &Path {
        self._temp_dir.path()
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root().join("plugins")
    }

    /// Where ephemeral configuration files for external plugins land.
    pub fn config_dir(&self) -> &Path {
        &self.config.plugins.temp_config_dir
    }

    /// Ephemeral configuration files currently on disk.
    pub fn config_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.config_dir())
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    /// Write another manifest. Call [`rediscover`](Self::rediscover) to pick it up.
    pub fn add_manifest(&self, dir: &str, manifest: &Value) -> Result<(), PlugvisorError> {
        write_json_manifest(&self.plugins_dir().join(dir), manifest)
    }

    /// Delete a plugin directory written earlier.
    pub fn remove_plugin_dir(&self, dir: &str) -> Result<(), PlugvisorError> {
        let path = self.plugins_dir().join(dir);
        std::fs::remove_dir_all(&path).map_err(|e| PlugvisorError::io(path.display(), e))
    }

    /// Re-scan the plugin folder; returns the number of definitions found.
    pub fn rediscover(&self) -> usize {
        self.catalog.discover_configured().len()
    }

    /// Serialize the harness configuration to `plugvisor.toml` in the temp
    /// directory, for driving the CLI.
    pub fn write_config_file(&self) -> Result<PathBuf, PlugvisorError> {
        let text = toml::to_string(&self.config)
            .map_err(|e| PlugvisorError::Internal(format!("failed to serialize config: {e}")))?;
        write_file(self.root(), "plugvisor.toml", &text)
    }
}

fn write_json_manifest(dir: &Path, manifest: &Value) -> Result<(), PlugvisorError> {
    let text = serde_json::to_string_pretty(manifest)
        .map_err(|e| PlugvisorError::Internal(format!("failed to serialize manifest: {e}")))?;
    write_file(dir, plugvisor_plugin::manifest::JSON_MANIFEST, &text).map(|_| ())
}

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, PlugvisorError> {
    std::fs::create_dir_all(dir).map_err(|e| PlugvisorError::io(dir.display(), e))?;
    let path = dir.join(name);
    std::fs::write(&path, contents).map_err(|e| PlugvisorError::io(path.display(), e))?;
    Ok(path)
}
