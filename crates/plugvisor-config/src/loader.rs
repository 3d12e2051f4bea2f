// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./plugvisor.toml` > `~/.config/plugvisor/plugvisor.toml` >
//! `/etc/plugvisor/plugvisor.toml` with environment variable overrides via `PLUGVISOR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PlugvisorConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/plugvisor/plugvisor.toml";

/// Configuration file looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = "plugvisor.toml";

/// Path of the per-user configuration file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("plugvisor").join("plugvisor.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/plugvisor/plugvisor.toml` (system-wide)
/// 3. `~/.config/plugvisor/plugvisor.toml` (user XDG config)
/// 4. `./plugvisor.toml` (local directory)
/// 5. `PLUGVISOR_*` environment variables
pub fn load_config() -> Result<PlugvisorConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<PlugvisorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlugvisorConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PlugvisorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlugvisorConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PlugvisorConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `PLUGVISOR_PLUGINS_STOP_TIMEOUT_SECS` must map to
/// `plugins.stop_timeout_secs`, not `plugins.stop.timeout.secs`.
fn env_provider() -> Env {
    Env::prefixed("PLUGVISOR_").map(|key| {
        let mapped = key
            .as_str()
            .replacen("host_", "host.", 1)
            .replacen("plugins_", "plugins.", 1);
        mapped.into()
    })
}
