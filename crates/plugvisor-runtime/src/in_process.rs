// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs in-process plugins.
//!
//! Every call into plugin code runs on its own task. An error returned by
//! the plugin is passed back unchanged; a panic becomes
//! [`PlugvisorError::Plugin`] instead of unwinding into the host.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use plugvisor_core::{HostContext, Plugin, PlugvisorError};
use plugvisor_plugin::{ModuleRegistry, PluginDefinition};
use serde_json::Value;

/// Loads in-process plugins and forwards life-cycle calls to them.
pub struct InProcessPluginRunner {
    modules: Arc<ModuleRegistry>,
}

impl InProcessPluginRunner {
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        Self { modules }
    }

    /// Resolve the definition's module and entry type and construct the plugin.
    pub fn load(&self, definition: &PluginDefinition) -> Result<Arc<dyn Plugin>, PlugvisorError> {
        let plugin = self.modules.instantiate(definition)?;
        tracing::debug!(plugin_id = %definition.id, "loaded in-process plugin");
        Ok(plugin)
    }

    pub async fn initialize(
        &self,
        plugin: &Arc<dyn Plugin>,
        host: Arc<dyn HostContext>,
        instance_id: &str,
        configuration: &str,
    ) -> Result<(), PlugvisorError> {
        let instance_id = instance_id.to_string();
        let configuration = configuration.to_string();
        isolated(plugin, "initialize", move |p| async move {
            p.initialize(host, &instance_id, &configuration).await
        })
        .await
    }

    pub async fn start(&self, plugin: &Arc<dyn Plugin>) -> Result<(), PlugvisorError> {
        isolated(plugin, "start", |p| async move { p.start().await }).await
    }

    pub async fn stop(&self, plugin: &Arc<dyn Plugin>) -> Result<(), PlugvisorError> {
        isolated(plugin, "stop", |p| async move { p.stop().await }).await
    }

    pub async fn execute_command(
        &self,
        plugin: &Arc<dyn Plugin>,
        name: &str,
        payload: Value,
    ) -> Result<Value, PlugvisorError> {
        let name = name.to_string();
        isolated(plugin, "execute_command", move |p| async move {
            p.execute_command(&name, payload).await
        })
        .await
    }

    pub async fn dispose(&self, plugin: &Arc<dyn Plugin>) -> Result<(), PlugvisorError> {
        isolated(plugin, "dispose", |p| async move { p.dispose().await }).await
    }
}

/// Run one plugin call on a separate task and fold a panic into an error.
async fn isolated<T, F, Fut>(
    plugin: &Arc<dyn Plugin>,
    operation: &'static str,
    call: F,
) -> Result<T, PlugvisorError>
where
    F: FnOnce(Arc<dyn Plugin>) -> Fut,
    Fut: Future<Output = Result<T, PlugvisorError>> + Send + 'static,
    T: Send + 'static,
{
    let plugin_id = plugin.id().to_string();
    match tokio::spawn(call(Arc::clone(plugin))).await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            let reason = panic_message(join_err.into_panic());
            tracing::error!(plugin_id = %plugin_id, operation, reason = %reason, "plugin panicked");
            Err(PlugvisorError::plugin(format!(
                "plugin {plugin_id} panicked during {operation}: {reason}"
            )))
        }
        Err(join_err) => Err(PlugvisorError::Internal(format!(
            "plugin {plugin_id} {operation} task was cancelled: {join_err}"
        ))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
