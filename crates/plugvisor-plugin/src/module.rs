// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of compiled-in plugin modules.
//!
//! An in-process manifest names a module (`assembly_path`) and an entry type
//! inside it (`main_class`). Modules are linked into the host binary and
//! register one [`PluginFactory`] per entry type.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use plugvisor_core::{Plugin, PlugvisorError};

use crate::manifest::PluginDefinition;

/// Builds plugin objects for one entry type.
pub trait PluginFactory: Send + Sync {
    /// Create a fresh plugin object. Called once per instance.
    fn create(&self, definition: &PluginDefinition) -> Result<Arc<dyn Plugin>, PlugvisorError>;
}

impl<F> PluginFactory for F
where
    F: Fn(&PluginDefinition) -> Result<Arc<dyn Plugin>, PlugvisorError> + Send + Sync,
{
    fn create(&self, definition: &PluginDefinition) -> Result<Arc<dyn Plugin>, PlugvisorError> {
        self(definition)
    }
}

/// Compiled-in modules keyed by module name, then entry type.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, HashMap<String, Arc<dyn PluginFactory>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the modules shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register(&mut registry);
        registry
    }

    /// Register `factory` as `entry_type` inside `module`. Names are case-insensitive.
    pub fn register(
        &mut self,
        module: &str,
        entry_type: &str,
        factory: impl PluginFactory + 'static,
    ) {
        self.modules
            .entry(module.to_lowercase())
            .or_default()
            .insert(entry_type.to_lowercase(), Arc::new(factory));
    }

    /// Whether a module with this name (or path) is registered.
    pub fn has_module(&self, assembly_path: &str) -> bool {
        self.find_module(assembly_path).is_some()
    }

    /// Number of registered entry types across all modules.
    pub fn len(&self) -> usize {
        self.modules.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Construct the plugin object named by an in-process definition.
    pub fn instantiate(
        &self,
        definition: &PluginDefinition,
    ) -> Result<Arc<dyn Plugin>, PlugvisorError> {
        let load_failure = |message: String| PlugvisorError::LoadFailure {
            plugin_id: definition.id.clone(),
            message,
        };

        let assembly = definition
            .assembly_path
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| load_failure("manifest has no assembly_path".to_string()))?;
        let entry_type = definition
            .main_class
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| load_failure("manifest has no main_class".to_string()))?;

        let module = self
            .find_module(assembly)
            .ok_or_else(|| load_failure(format!("module '{assembly}' is not available")))?;
        let factory = module.get(&entry_type.to_lowercase()).ok_or_else(|| {
            load_failure(format!("entry type '{entry_type}' not found in module '{assembly}'"))
        })?;

        factory.create(definition).map_err(|e| match e {
            PlugvisorError::LoadFailure { .. } => e,
            other => load_failure(format!("failed to construct '{entry_type}': {other}")),
        })
    }

    /// Exact name first, then the file stem so that `lib/foo.so` finds `foo`.
    fn find_module(&self, assembly_path: &str) -> Option<&HashMap<String, Arc<dyn PluginFactory>>> {
        let key = assembly_path.to_lowercase();
        self.modules.get(&key).or_else(|| {
            Path::new(&key)
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| self.modules.get(stem))
        })
    }
}
