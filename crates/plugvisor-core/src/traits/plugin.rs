// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contract implemented by in-process plugins.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PlugvisorError;
use crate::traits::host::HostContext;

/// A plugin that runs inside the host process.
///
/// The runtime drives every instance through `initialize`, then any number of
/// `start`/`stop` cycles, then `dispose`. Calls are never issued concurrently
/// for the same instance, except `execute_command`, which the host forwards
/// as soon as it is asked to.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Returns the plugin identifier this implementation belongs to.
    fn id(&self) -> &str;

    /// Hands the plugin its host context, instance id, and configuration
    /// document (a JSON string).
    async fn initialize(
        &self,
        host: Arc<dyn HostContext>,
        instance_id: &str,
        configuration: &str,
    ) -> Result<(), PlugvisorError>;

    /// Begins the plugin's active work.
    async fn start(&self) -> Result<(), PlugvisorError>;

    /// Ends the plugin's active work. May be followed by another `start`.
    async fn stop(&self) -> Result<(), PlugvisorError>;

    /// Runs a named command with a JSON payload and returns a JSON result.
    async fn execute_command(
        &self,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, PlugvisorError>;

    /// Releases resources held by the plugin. Called once, last.
    async fn dispose(&self) -> Result<(), PlugvisorError> {
        Ok(())
    }
}
