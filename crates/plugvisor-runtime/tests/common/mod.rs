// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use plugvisor_plugin::{ConfigurationValidator, ModuleRegistry, PluginCatalog};
use plugvisor_runtime::{PluginInstanceRegistry, RegistrySettings};
use serde_json::Value;
use tempfile::TempDir;

pub struct Fixture {
    pub root: TempDir,
    pub registry: PluginInstanceRegistry,
}

impl Fixture {
    pub fn plugins_dir(&self) -> PathBuf {
        self.root.path().join("plugins")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.path().join("configs")
    }

    pub fn config_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.config_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Write each `(directory, manifest)` pair under a fresh plugins directory
/// and wire a registry over it.
pub fn fixture(manifests: &[(&str, Value)], modules: ModuleRegistry) -> Fixture {
    fixture_with_timeout(manifests, modules, Duration::from_secs(5))
}

pub fn fixture_with_timeout(
    manifests: &[(&str, Value)],
    modules: ModuleRegistry,
    stop_timeout: Duration,
) -> Fixture {
    let root = TempDir::new().unwrap();
    let plugins = root.path().join("plugins");
    for (dir, manifest) in manifests {
        write_manifest(&plugins.join(dir), manifest);
    }

    let catalog = Arc::new(PluginCatalog::new(vec![plugins.display().to_string()]));
    catalog.discover_configured();
    let validator = Arc::new(ConfigurationValidator::new(
        Arc::clone(&catalog),
        root.path().join("configs"),
    ));
    let settings = RegistrySettings {
        workspace_root: root.path().join("workspaces"),
        stop_timeout,
        validate_on_create: false,
    };
    let registry = PluginInstanceRegistry::new(catalog, validator, Arc::new(modules), settings);
    Fixture { root, registry }
}

pub fn write_manifest(dir: &Path, manifest: &Value) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("manifest.json"),
        serde_json::to_string_pretty(manifest).unwrap(),
    )
    .unwrap();
}
