// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Plugvisor plugin host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Plugvisor configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlugvisorConfig {
    /// Host process settings.
    #[serde(default)]
    pub host: HostConfig,

    /// Plugin discovery and supervision settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// Host process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Root directory under which each workspace gets its own folder.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            workspace_root: default_workspace_root(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_workspace_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("plugvisor").join("workspaces"))
        .unwrap_or_else(|| PathBuf::from(".plugvisor/workspaces"))
}

/// Plugin discovery and supervision configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Directories scanned recursively for plugin manifests.
    ///
    /// Entries may reference environment variables (`$VAR`, `${VAR}`, `%VAR%`)
    /// or start with `~`; they are expanded at discovery time.
    #[serde(default = "default_scan_directories")]
    pub scan_directories: Vec<String>,

    /// Directory where per-instance configuration files are written for
    /// external plugins.
    #[serde(default = "default_temp_config_dir")]
    pub temp_config_dir: PathBuf,

    /// Seconds to wait for an external plugin to exit after a graceful stop
    /// request before it is force-killed.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Validate the initial configuration against the plugin schema when an
    /// instance is created.
    #[serde(default)]
    pub validate_on_create: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            scan_directories: default_scan_directories(),
            temp_config_dir: default_temp_config_dir(),
            stop_timeout_secs: default_stop_timeout_secs(),
            validate_on_create: false,
        }
    }
}

fn default_scan_directories() -> Vec<String> {
    vec!["~/.plugvisor/plugins".to_string(), "./plugins".to_string()]
}

fn default_temp_config_dir() -> PathBuf {
    std::env::temp_dir().join("plugvisor").join("configs")
}

fn default_stop_timeout_secs() -> u64 {
    5
}
