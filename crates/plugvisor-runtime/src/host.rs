// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host context handed to in-process plugins.

use std::path::{Path, PathBuf};

use plugvisor_core::{HostContext, LogLevel};

/// Forwards plugin log calls into `tracing`, tagged with the instance, and
/// resolves the instance's workspace directory.
#[derive(Debug, Clone)]
pub struct RuntimeHostContext {
    instance_id: String,
    plugin_id: String,
    workspace_dir: PathBuf,
}

impl RuntimeHostContext {
    pub fn new(
        instance_id: impl Into<String>,
        plugin_id: impl Into<String>,
        workspace_root: &Path,
        workspace_id: &str,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            plugin_id: plugin_id.into(),
            workspace_dir: workspace_root.join(workspace_id),
        }
    }
}

impl HostContext for RuntimeHostContext {
    fn log(&self, level: LogLevel, message: &str) {
        let (instance_id, plugin_id) = (self.instance_id.as_str(), self.plugin_id.as_str());
        match level {
            LogLevel::Trace => tracing::trace!(instance_id, plugin_id, "{message}"),
            LogLevel::Debug => tracing::debug!(instance_id, plugin_id, "{message}"),
            LogLevel::Info => tracing::info!(instance_id, plugin_id, "{message}"),
            LogLevel::Warning => tracing::warn!(instance_id, plugin_id, "{message}"),
            LogLevel::Error => tracing::error!(instance_id, plugin_id, "{message}"),
        }
    }

    fn workspace_path(&self) -> PathBuf {
        self.workspace_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn workspace_path_is_scoped_to_workspace_id() {
        let host = RuntimeHostContext::new("inst", "plugin", Path::new("/data/ws"), "alpha");
        assert_eq!(host.workspace_path(), PathBuf::from("/data/ws/alpha"));
    }

    #[test]
    #[traced_test]
    fn log_is_tagged_with_instance() {
        let host = RuntimeHostContext::new("inst-42", "plugin.x", Path::new("/w"), "ws");
        host.log(LogLevel::Warning, "disk almost full");
        assert!(logs_contain("disk almost full"));
        assert!(logs_contain("inst-42"));
    }
}
