// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin discovery and lookup.
//!
//! The catalog walks the configured scan directories for manifests and keeps
//! the last discovered set behind an `ArcSwap`, so lookups never block a
//! running discovery and a discovery replaces the whole set at once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use regex::{Captures, Regex};
use walkdir::WalkDir;

use crate::manifest::{JSON_MANIFEST, PluginDefinition, TOML_MANIFEST, load_manifest};

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)|%([A-Za-z_][A-Za-z0-9_()]*)%")
        .expect("static regex")
});

/// Expand environment references (`$VAR`, `${VAR}`, `%VAR%`) and a leading `~`.
///
/// Undefined variables are left untouched.
pub fn expand_path(raw: &str) -> String {
    let expanded = ENV_REFERENCE.replace_all(raw, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    });

    match expanded.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => match dirs::home_dir() {
            Some(home) => format!("{}{rest}", home.display()),
            None => expanded.into_owned(),
        },
        _ => expanded.into_owned(),
    }
}

/// Discovered plugin definitions.
pub struct PluginCatalog {
    scan_directories: Vec<String>,
    definitions: ArcSwap<Vec<PluginDefinition>>,
}

impl PluginCatalog {
    /// Create an empty catalog that scans `scan_directories` on
    /// [`discover_configured`](Self::discover_configured).
    pub fn new(scan_directories: Vec<String>) -> Self {
        Self {
            scan_directories,
            definitions: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Scan the directories given at construction.
    pub fn discover_configured(&self) -> Vec<PluginDefinition> {
        self.discover(&self.scan_directories)
    }

    /// Scan `scan_directories` recursively and replace the cached set.
    ///
    /// Unreadable or invalid manifests and duplicate ids are logged and
    /// skipped; the scan itself never fails.
    pub fn discover(&self, scan_directories: &[String]) -> Vec<PluginDefinition> {
        let mut found: Vec<PluginDefinition> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for raw in scan_directories {
            if raw.trim().is_empty() {
                continue;
            }
            let dir = PathBuf::from(expand_path(raw.trim()));
            if !dir.is_dir() {
                tracing::warn!(path = %dir.display(), "plugin directory does not exist, skipping");
                continue;
            }

            for manifest_path in manifest_files(&dir) {
                let definition = match load_manifest(&manifest_path) {
                    Ok(def) => def,
                    Err(e) => {
                        tracing::warn!(
                            path = %manifest_path.display(),
                            error = %e,
                            "skipping invalid plugin manifest"
                        );
                        continue;
                    }
                };

                if !seen_ids.insert(definition.id.to_lowercase()) {
                    tracing::warn!(
                        plugin_id = %definition.id,
                        path = %manifest_path.display(),
                        "duplicate plugin id, keeping the first manifest"
                    );
                    continue;
                }

                tracing::debug!(
                    plugin_id = %definition.id,
                    kind = %definition.execution_kind,
                    path = %manifest_path.display(),
                    "discovered plugin"
                );
                found.push(definition);
            }
        }

        tracing::info!(count = found.len(), "plugin discovery complete");
        self.definitions.store(Arc::new(found.clone()));
        found
    }

    /// Case-insensitive lookup in the last discovered set.
    pub fn lookup_by_id(&self, id: &str) -> Option<PluginDefinition> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        self.definitions
            .load()
            .iter()
            .find(|d| d.id.eq_ignore_ascii_case(id))
            .cloned()
    }

    /// Snapshot of the last discovered set.
    pub fn definitions(&self) -> Arc<Vec<PluginDefinition>> {
        self.definitions.load_full()
    }

    /// Replace the cached set directly, bypassing the filesystem.
    pub fn replace(&self, definitions: Vec<PluginDefinition>) {
        self.definitions.store(Arc::new(definitions));
    }
}

fn manifest_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "error while scanning plugin directory");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name();
            name == JSON_MANIFEST || name == TOML_MANIFEST
        })
        .map(|entry| entry.into_path())
        .collect()
}
