// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Plugvisor configuration system.

use std::path::{Path, PathBuf};

use figment::Jail;
use serial_test::serial;
use plugvisor_config::diagnostic::ConfigError;
use plugvisor_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[host]
log_level = "debug"
workspace_root = "/srv/plugvisor/workspaces"

[plugins]
scan_directories = ["/opt/plugins", "$HOME/.plugins"]
temp_config_dir = "/tmp/pv"
stop_timeout_secs = 10
validate_on_create = true
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.host.log_level, "debug");
    assert_eq!(
        config.host.workspace_root,
        PathBuf::from("/srv/plugvisor/workspaces")
    );
    assert_eq!(
        config.plugins.scan_directories,
        vec!["/opt/plugins", "$HOME/.plugins"]
    );
    assert_eq!(config.plugins.temp_config_dir, PathBuf::from("/tmp/pv"));
    assert_eq!(config.plugins.stop_timeout_secs, 10);
    assert!(config.plugins.validate_on_create);
}

/// Empty TOML yields the compiled defaults.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.host.log_level, "info");
    assert_eq!(config.plugins.stop_timeout_secs, 5);
    assert!(!config.plugins.validate_on_create);
}

/// Unknown field in [plugins] is rejected by deny_unknown_fields.
#[test]
fn unknown_field_in_plugins_produces_error() {
    let toml = r#"
[plugins]
stop_timout_secs = 3
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = err.to_string();
    assert!(
        err_str.contains("unknown field") || err_str.contains("stop_timout_secs"),
        "error should mention the bad key, got: {err_str}"
    );
}

/// Unknown key surfaces as a diagnostic with a suggestion.
#[test]
fn unknown_key_diagnostic_suggests_correction() {
    let toml = r#"
[host]
log_levle = "debug"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    let found = errors.iter().any(|e| {
        matches!(
            e,
            ConfigError::UnknownKey { key, suggestion: Some(s), .. }
                if key == "log_levle" && s == "log_level"
        )
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

/// Unexpected top-level section is rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[logging]
level = "debug"
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// Wrong value type produces an InvalidType diagnostic.
#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[plugins]
stop_timeout_secs = "five"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("stop_timeout_secs"))),
        "got: {errors:?}"
    );
}

/// Semantic validation runs after a successful parse.
#[test]
fn semantic_validation_rejects_out_of_range_timeout() {
    let toml = r#"
[plugins]
stop_timeout_secs = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert!(errors.iter().any(|e| matches!(e, ConfigError::Validation { .. })));
}

/// PLUGVISOR_PLUGINS_STOP_TIMEOUT_SECS maps to plugins.stop_timeout_secs, not
/// plugins.stop.timeout.secs.
#[test]
#[serial]
fn env_var_maps_underscored_keys() {
    Jail::expect_with(|jail| {
        jail.set_env("PLUGVISOR_PLUGINS_STOP_TIMEOUT_SECS", "9");
        jail.set_env("PLUGVISOR_HOST_LOG_LEVEL", "warn");
        let config = load_config_from_path(Path::new("absent.toml"))?;
        assert_eq!(config.plugins.stop_timeout_secs, 9);
        assert_eq!(config.host.log_level, "warn");
        Ok(())
    });
}

/// Environment overrides take precedence over the file.
#[test]
#[serial]
fn env_var_overrides_file_value() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[plugins]
stop_timeout_secs = 30
validate_on_create = false
"#,
        )?;
        jail.set_env("PLUGVISOR_PLUGINS_VALIDATE_ON_CREATE", "true");
        let config = load_config_from_path(Path::new("custom.toml"))?;
        assert_eq!(config.plugins.stop_timeout_secs, 30);
        assert!(config.plugins.validate_on_create);
        Ok(())
    });
}

/// A config file on disk is loaded and validated with path-based diagnostics.
#[test]
#[serial]
fn load_and_validate_path_reports_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plugvisor.toml");
    std::fs::write(&path, "[host]\nlog_level = \"chatty\"\n").unwrap();

    let errors = load_and_validate_path(&path).expect_err("log level is invalid");
    assert!(errors.iter().any(|e| e.to_string().contains("host.log_level")));
}
