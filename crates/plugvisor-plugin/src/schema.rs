// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration documents checked against a plugin's declared JSON schema.
//!
//! The validator also derives default documents from a schema and writes the
//! per-instance configuration files handed to external plugins.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use plugvisor_core::{PlugvisorError, ValidationResult};
use serde_json::{Map, Value};

use crate::catalog::PluginCatalog;
use crate::manifest::PluginDefinition;

/// Validates, derives, and materializes plugin configuration documents.
pub struct ConfigurationValidator {
    catalog: Arc<PluginCatalog>,
    temp_config_dir: PathBuf,
    /// Plugin ids for which the "no schema" notice was already logged.
    schemaless_noted: DashSet<String>,
}

impl ConfigurationValidator {
    pub fn new(catalog: Arc<PluginCatalog>, temp_config_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            temp_config_dir: temp_config_dir.into(),
            schemaless_noted: DashSet::new(),
        }
    }

    /// Directory where ephemeral configuration files are written.
    pub fn temp_config_dir(&self) -> &Path {
        &self.temp_config_dir
    }

    /// Validate `document` (JSON text) against the definition's schema.
    pub fn validate(&self, definition: &PluginDefinition, document: &str) -> ValidationResult {
        let Some(schema) = definition.config_schema.as_ref() else {
            if self.schemaless_noted.insert(definition.id.to_lowercase()) {
                tracing::info!(
                    plugin_id = %definition.id,
                    "plugin declares no configuration schema, accepting any configuration"
                );
            }
            return ValidationResult::valid();
        };

        let instance: Value = match serde_json::from_str(document) {
            Ok(v) => v,
            Err(e) => {
                let message = format!("configuration is not valid JSON: {e}");
                return ValidationResult::invalid(message.clone(), vec![message]);
            }
        };

        let validator = match jsonschema::validator_for(schema) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(plugin_id = %definition.id, error = %e, "invalid configuration schema");
                let message = format!("plugin configuration schema is invalid: {e}");
                return ValidationResult::invalid(message.clone(), vec![message]);
            }
        };

        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|err| {
                let location = err.instance_path.to_string();
                let location = if location.is_empty() { "/".to_string() } else { location };
                format!("{location}: {err}")
            })
            .collect();

        if errors.is_empty() {
            ValidationResult::valid()
        } else {
            tracing::debug!(plugin_id = %definition.id, count = errors.len(), "configuration failed validation");
            ValidationResult::invalid(
                format!("configuration has {} schema violation(s)", errors.len()),
                errors,
            )
        }
    }

    /// Validate against the definition registered under `plugin_id`.
    pub fn validate_by_id(&self, plugin_id: &str, document: &str) -> ValidationResult {
        match self.catalog.lookup_by_id(plugin_id) {
            Some(definition) => self.validate(&definition, document),
            None => {
                let message = format!("plugin not found: {plugin_id}");
                ValidationResult::invalid(message.clone(), vec![message])
            }
        }
    }

    /// Default configuration document derived from the definition's schema.
    ///
    /// Always an object; anything else the schema would produce becomes `{}`.
    pub fn default_configuration(&self, definition: &PluginDefinition) -> Value {
        match definition.config_schema.as_ref().map(default_for_node) {
            Some(value @ Value::Object(_)) => value,
            _ => Value::Object(Map::new()),
        }
    }

    pub fn default_configuration_by_id(&self, plugin_id: &str) -> Value {
        match self.catalog.lookup_by_id(plugin_id) {
            Some(definition) => self.default_configuration(&definition),
            None => {
                tracing::warn!(plugin_id = %plugin_id, "no such plugin, returning empty default configuration");
                Value::Object(Map::new())
            }
        }
    }

    /// Same as [`default_configuration_by_id`](Self::default_configuration_by_id).
    pub fn reset_configuration(&self, plugin_id: &str) -> Value {
        self.default_configuration_by_id(plugin_id)
    }

    /// Write `document` to a fresh file scoped to one instance and return its path.
    ///
    /// The caller owns the file and must remove it with
    /// [`remove_ephemeral_config`](Self::remove_ephemeral_config).
    pub fn materialize_ephemeral_config(
        &self,
        plugin_id: &str,
        instance_id: &str,
        document: &str,
    ) -> Result<PathBuf, PlugvisorError> {
        std::fs::create_dir_all(&self.temp_config_dir).map_err(|e| {
            PlugvisorError::io(
                format!("creating config directory {}", self.temp_config_dir.display()),
                e,
            )
        })?;

        let prefix = format!("{}-{instance_id}-", sanitize_file_component(plugin_id));
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".json")
            .tempfile_in(&self.temp_config_dir)
            .map_err(|e| PlugvisorError::io("creating ephemeral config file", e))?;

        file.write_all(document.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| PlugvisorError::io("writing ephemeral config file", e))?;

        let (_, path) = file
            .keep()
            .map_err(|e| PlugvisorError::io("persisting ephemeral config file", e.error))?;

        tracing::debug!(
            plugin_id = %plugin_id,
            instance_id = %instance_id,
            path = %path.display(),
            "wrote ephemeral configuration"
        );
        Ok(path)
    }

    /// Delete an ephemeral configuration file. A file that is already gone is not an error.
    pub fn remove_ephemeral_config(&self, path: &Path) -> Result<(), PlugvisorError> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed ephemeral configuration");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PlugvisorError::io(
                format!("removing {}", path.display()),
                e,
            )),
        }
    }
}

/// Keep plugin ids usable inside a file name.
fn sanitize_file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

/// Default value for one schema node.
fn default_for_node(node: &Value) -> Value {
    let Value::Object(node) = node else {
        return Value::Null;
    };

    if let Some(default) = node.get("default") {
        return default.clone();
    }

    let declared = match node.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    };
    let declared = declared.or_else(|| node.contains_key("properties").then_some("object"));

    match declared {
        Some("string") => Value::String(String::new()),
        Some("number") | Some("integer") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        Some("array") => Value::Array(Vec::new()),
        Some("object") => {
            let properties = node
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| {
                    props
                        .iter()
                        .map(|(name, child)| (name.clone(), default_for_node(child)))
                        .collect::<Map<String, Value>>()
                })
                .unwrap_or_default();
            Value::Object(properties)
        }
        _ => Value::Null,
    }
}
