// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manifest fixtures.

use plugvisor_plugin::{BUILTIN_MODULE, CALCULATOR_ENTRY, ECHO_ENTRY};
use serde_json::{Value, json};

/// In-process manifest for the built-in calculator.
pub fn calculator_manifest(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Calculator",
        "version": "1.0.0",
        "description": "Adds numbers",
        "author": "Plugvisor",
        "plugin_type": "InProcessModule",
        "assembly_path": BUILTIN_MODULE,
        "main_class": CALCULATOR_ENTRY,
        "config_schema": {
            "type": "object",
            "properties": {
                "precision": {"type": "integer", "minimum": 0, "default": 2},
                "mode": {"type": "string", "enum": ["basic", "scientific"], "default": "basic"},
                "history": {"type": "boolean"}
            },
            "required": ["precision"]
        }
    })
}

/// In-process manifest for the built-in echo plugin. Declares no schema.
pub fn echo_manifest(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Echo",
        "version": "0.1.0",
        "assembly_path": BUILTIN_MODULE,
        "main_class": ECHO_ENTRY
    })
}

/// External manifest that runs `script` with `sh -c`.
///
/// The script sees `$0` as the plugin id followed by `--instance ID
/// --config PATH --workspace ID`.
pub fn shell_manifest(id: &str, script: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Shell {id}"),
        "plugin_type": "ExternalProcess",
        "executable": "sh",
        "args_template": format!(
            "-c \"{script}\" {id} --instance {{instanceId}} --config {{configPath}} --workspace {{workspaceId}}"
        ),
        "communication": {"type": "stdio"}
    })
}

/// A shell script that runs until it receives SIGTERM, then exits cleanly.
pub const LONG_RUNNING_SCRIPT: &str = "trap 'exit 0' TERM; while :; do sleep 0.05; done";
