// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin discovery, configuration validation, and compiled-in modules.
//!
//! [`PluginCatalog`] turns manifests on disk into [`PluginDefinition`]s,
//! [`ConfigurationValidator`] checks and derives configuration documents
//! against each plugin's schema, and [`ModuleRegistry`] resolves in-process
//! plugins to factories linked into the host.

pub mod builtin;
pub mod catalog;
pub mod manifest;
pub mod module;
pub mod schema;

pub use builtin::{BUILTIN_MODULE, CALCULATOR_ENTRY, ECHO_ENTRY};
pub use catalog::{PluginCatalog, expand_path};
pub use manifest::{
    CommunicationInfo, PluginDefinition, load_manifest, parse_manifest_json, parse_manifest_toml,
};
pub use module::{ModuleRegistry, PluginFactory};
pub use schema::ConfigurationValidator;
