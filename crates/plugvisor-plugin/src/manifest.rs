// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin manifest parsing from `manifest.json` and `plugin.toml` files.
//!
//! Both formats share the same flat field names. A parsed manifest becomes an
//! immutable [`PluginDefinition`] that remembers where it was found.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use plugvisor_core::{ExecutionKind, PlugvisorError};
use serde::{Deserialize, Serialize};

/// File name of a JSON manifest.
pub const JSON_MANIFEST: &str = "manifest.json";

/// File name of a TOML manifest.
pub const TOML_MANIFEST: &str = "plugin.toml";

/// Transport descriptor declared by a plugin. Carried verbatim, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationInfo {
    #[serde(rename = "type", default = "default_communication_type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for CommunicationInfo {
    fn default() -> Self {
        Self {
            kind: default_communication_type(),
            extra: serde_json::Map::new(),
        }
    }
}

fn default_communication_type() -> String {
    "stdio".to_string()
}

/// An installable plugin, as described by its manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginDefinition {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub execution_kind: ExecutionKind,
    /// Program launched for external plugins.
    pub executable: Option<String>,
    /// Argument line with `{instanceId}`, `{configPath}`, `{workspaceId}` placeholders.
    pub args_template: Option<String>,
    /// Module name resolved through the module registry for in-process plugins.
    pub assembly_path: Option<String>,
    /// Entry type inside the module.
    pub main_class: Option<String>,
    pub config_schema: Option<serde_json::Value>,
    pub communication: CommunicationInfo,
    pub icon: Option<String>,
    /// Manifest file this definition was read from.
    pub manifest_path: PathBuf,
}

impl PluginDefinition {
    /// Directory containing the manifest.
    pub fn manifest_dir(&self) -> &Path {
        self.manifest_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// The executable to launch.
    ///
    /// Relative paths with more than one component (`bin/server`, `./run.sh`)
    /// resolve against the manifest directory; bare names are left for `PATH`
    /// lookup.
    pub fn resolved_executable(&self) -> Option<PathBuf> {
        let raw = self.executable.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let path = Path::new(raw);
        if path.is_relative() && path.components().count() > 1 {
            Some(self.manifest_dir().join(path))
        } else {
            Some(path.to_path_buf())
        }
    }
}

/// On-disk manifest layout. Every field is optional so that missing required
/// fields produce a targeted message instead of a serde error.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ManifestDocument {
    id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    author: Option<String>,
    plugin_type: Option<String>,
    executable: Option<String>,
    args_template: Option<String>,
    assembly_path: Option<String>,
    main_class: Option<String>,
    config_schema: Option<serde_json::Value>,
    communication: Option<CommunicationInfo>,
    icon: Option<String>,
}

/// Parse a JSON manifest.
pub fn parse_manifest_json(
    content: &str,
    manifest_path: &Path,
) -> Result<PluginDefinition, PlugvisorError> {
    let doc: ManifestDocument = serde_json::from_str(content).map_err(|e| {
        PlugvisorError::Config(format!(
            "invalid manifest {}: {e}",
            manifest_path.display()
        ))
    })?;
    into_definition(doc, manifest_path)
}

/// Parse a TOML manifest. The schema, if any, is a TOML table converted to JSON.
pub fn parse_manifest_toml(
    content: &str,
    manifest_path: &Path,
) -> Result<PluginDefinition, PlugvisorError> {
    let doc: ManifestDocument = toml::from_str(content).map_err(|e| {
        PlugvisorError::Config(format!(
            "invalid manifest {}: {e}",
            manifest_path.display()
        ))
    })?;
    into_definition(doc, manifest_path)
}

/// Read and parse a manifest, choosing the format from the file extension.
pub fn load_manifest(path: &Path) -> Result<PluginDefinition, PlugvisorError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PlugvisorError::io(format!("reading {}", path.display()), e))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_manifest_toml(&content, path),
        _ => parse_manifest_json(&content, path),
    }
}

fn required(value: Option<String>, field: &str, path: &Path) -> Result<String, PlugvisorError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PlugvisorError::Config(format!(
            "manifest {}: `{field}` must not be empty",
            path.display()
        ))),
    }
}

fn into_definition(
    doc: ManifestDocument,
    manifest_path: &Path,
) -> Result<PluginDefinition, PlugvisorError> {
    let id = required(doc.id, "id", manifest_path)?;
    let name = required(doc.name, "name", manifest_path)?;

    let execution_kind = match doc.plugin_type.as_deref().map(str::trim) {
        None | Some("") => ExecutionKind::default(),
        Some(raw) => ExecutionKind::from_str(raw).map_err(|_| {
            PlugvisorError::Config(format!(
                "manifest {}: unknown plugin_type '{raw}', expected InProcessModule or ExternalProcess",
                manifest_path.display()
            ))
        })?,
    };

    let version = doc.version.unwrap_or_default();
    if !version.is_empty() && semver::Version::parse(&version).is_err() {
        tracing::debug!(plugin_id = %id, version = %version, "manifest version is not semver");
    }

    Ok(PluginDefinition {
        id,
        name,
        version,
        description: doc.description.unwrap_or_default(),
        author: doc.author.unwrap_or_default(),
        execution_kind,
        executable: doc.executable,
        args_template: doc.args_template,
        assembly_path: doc.assembly_path,
        main_class: doc.main_class,
        config_schema: doc.config_schema.filter(|s| !s.is_null()),
        communication: doc.communication.unwrap_or_default(),
        icon: doc.icon,
        manifest_path: manifest_path.to_path_buf(),
    })
}
