// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Services the host offers to in-process plugins.

use std::path::PathBuf;

use crate::types::LogLevel;

/// Host services available to a plugin instance.
pub trait HostContext: Send + Sync {
    /// Records a message in the host's log, attributed to the calling instance.
    fn log(&self, level: LogLevel, message: &str);

    /// Directory the instance may use for its workspace files.
    fn workspace_path(&self) -> PathBuf;
}
