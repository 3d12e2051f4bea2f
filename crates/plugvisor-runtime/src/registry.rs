// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The plugin instance registry and its life-cycle state machine.
//!
//! Instances live in a `DashMap` keyed by instance id. Each life-cycle call
//! holds the instance's runtime mutex for its whole duration and acquires it
//! with `try_lock`, so a second call on the same instance while one is in
//! flight is rejected with [`PlugvisorError::Busy`]. Different instances
//! never contend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use plugvisor_config::PlugvisorConfig;
use plugvisor_core::{ExecutionKind, InstanceStatus, Plugin, PlugvisorError};
use plugvisor_plugin::{ConfigurationValidator, ModuleRegistry, PluginCatalog};
use serde_json::Value;
use tokio::sync::{MutexGuard, watch};

use crate::host::RuntimeHostContext;
use crate::in_process::InProcessPluginRunner;
use crate::instance::{InstanceInfo, InstanceRecord, InstanceRuntime, InstanceSlot};
use crate::process::{ExitOutcome, ProcessPluginRunner, wait_for_exit};

/// Registry-wide settings, usually derived from the host configuration.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Parent of every workspace directory handed to in-process plugins.
    pub workspace_root: PathBuf,
    /// How long an external plugin gets to exit after the stop request.
    pub stop_timeout: Duration,
    /// Validate the initial configuration in [`PluginInstanceRegistry::create`].
    pub validate_on_create: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self::from(&PlugvisorConfig::default())
    }
}

impl From<&PlugvisorConfig> for RegistrySettings {
    fn from(config: &PlugvisorConfig) -> Self {
        Self {
            workspace_root: config.host.workspace_root.clone(),
            stop_timeout: Duration::from_secs(config.plugins.stop_timeout_secs),
            validate_on_create: config.plugins.validate_on_create,
        }
    }
}

#[derive(Clone, Copy)]
enum Acquire {
    FailFast,
    Wait,
}

/// Owns every plugin instance and drives it through its life cycle.
pub struct PluginInstanceRegistry {
    catalog: Arc<PluginCatalog>,
    validator: Arc<ConfigurationValidator>,
    in_process: InProcessPluginRunner,
    process: Arc<ProcessPluginRunner>,
    instances: DashMap<String, Arc<InstanceSlot>>,
    settings: RegistrySettings,
}

impl PluginInstanceRegistry {
    pub fn new(
        catalog: Arc<PluginCatalog>,
        validator: Arc<ConfigurationValidator>,
        modules: Arc<ModuleRegistry>,
        settings: RegistrySettings,
    ) -> Self {
        let process = ProcessPluginRunner::new(Arc::clone(&validator), settings.stop_timeout);
        Self {
            catalog,
            validator,
            in_process: InProcessPluginRunner::new(modules),
            process: Arc::new(process),
            instances: DashMap::new(),
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    pub fn validator(&self) -> &Arc<ConfigurationValidator> {
        &self.validator
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Create an instance of `plugin_id` in `Created` state.
    ///
    /// Blank configuration text is stored as `{}`. When `validate_on_create`
    /// is set the configuration must satisfy the plugin's schema.
    pub async fn create(
        &self,
        plugin_id: &str,
        workspace_id: &str,
        initial_config: &str,
    ) -> Result<InstanceInfo, PlugvisorError> {
        self.create_inner(plugin_id, workspace_id, initial_config, self.settings.validate_on_create)
    }

    /// Like [`create`](Self::create), but always validates the configuration.
    pub async fn create_validated(
        &self,
        plugin_id: &str,
        workspace_id: &str,
        initial_config: &str,
    ) -> Result<InstanceInfo, PlugvisorError> {
        self.create_inner(plugin_id, workspace_id, initial_config, true)
    }

    fn create_inner(
        &self,
        plugin_id: &str,
        workspace_id: &str,
        initial_config: &str,
        validate: bool,
    ) -> Result<InstanceInfo, PlugvisorError> {
        let definition = self
            .catalog
            .lookup_by_id(plugin_id)
            .ok_or_else(|| PlugvisorError::plugin_not_found(plugin_id))?;

        let configuration = if initial_config.trim().is_empty() {
            "{}".to_string()
        } else {
            initial_config.to_string()
        };

        if validate {
            let result = self.validator.validate(&definition, &configuration);
            if !result.is_valid {
                return Err(PlugvisorError::ValidationFailure {
                    plugin_id: definition.id.clone(),
                    errors: result.errors,
                });
            }
        }

        let instance_id = uuid::Uuid::new_v4().to_string();
        let record = InstanceRecord::new(instance_id.clone(), &definition, workspace_id, configuration);
        let info = record.info.clone();

        match self.instances.entry(instance_id.clone()) {
            Entry::Occupied(_) => return Err(PlugvisorError::Conflict { id: instance_id }),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(InstanceSlot::new(definition, record)));
            }
        }

        tracing::info!(
            instance_id = %info.instance_id,
            plugin_id = %info.plugin_id,
            workspace_id = %info.workspace_id,
            kind = %info.execution_kind,
            "created plugin instance"
        );
        Ok(info)
    }

    /// `Created → Initialized`. In-process plugins are loaded and initialized
    /// here; external plugins only change status.
    pub async fn initialize(&self, instance_id: &str) -> Result<(), PlugvisorError> {
        let slot = self.slot(instance_id)?;
        let mut runtime = acquire(&slot, instance_id, "initialize", Acquire::FailFast).await?;

        let (configuration, workspace_id) = {
            let mut record = slot.record.write().await;
            if record.status() != InstanceStatus::Created {
                return Err(record.invalid_state("initialize"));
            }
            record.transition(InstanceStatus::Initializing, "initialize")?;
            (record.configuration.clone(), record.info.workspace_id.clone())
        };

        let result = match slot.definition.execution_kind {
            ExecutionKind::InProcessModule => self
                .load_and_initialize(&slot, instance_id, &workspace_id, &configuration)
                .await
                .map(|plugin| *runtime = InstanceRuntime::InProcess(plugin)),
            ExecutionKind::ExternalProcess => Ok(()),
        };

        let mut record = slot.record.write().await;
        match result {
            Ok(()) => {
                record.transition(InstanceStatus::Initialized, "initialize")?;
                record.info.initialized_at = Some(Utc::now());
                tracing::info!(instance_id = %instance_id, "plugin instance initialized");
                Ok(())
            }
            Err(e) => {
                record.fail(&e);
                Err(e)
            }
        }
    }

    async fn load_and_initialize(
        &self,
        slot: &InstanceSlot,
        instance_id: &str,
        workspace_id: &str,
        configuration: &str,
    ) -> Result<Arc<dyn Plugin>, PlugvisorError> {
        let plugin = self.in_process.load(&slot.definition)?;
        let host = Arc::new(RuntimeHostContext::new(
            instance_id,
            slot.definition.id.as_str(),
            &self.settings.workspace_root,
            workspace_id,
        ));
        self.in_process
            .initialize(&plugin, host, instance_id, configuration)
            .await?;
        Ok(plugin)
    }

    /// Start the instance. External plugins are launched here.
    pub async fn start(&self, instance_id: &str) -> Result<(), PlugvisorError> {
        let slot = self.slot(instance_id)?;
        let mut runtime = acquire(&slot, instance_id, "start", Acquire::FailFast).await?;

        let (configuration, workspace_id) = {
            let mut record = slot.record.write().await;
            if !record.status().can_start(slot.definition.execution_kind) {
                return Err(record.invalid_state("start"));
            }
            record.transition(InstanceStatus::Starting, "start")?;
            (record.configuration.clone(), record.info.workspace_id.clone())
        };

        let result = match slot.definition.execution_kind {
            ExecutionKind::InProcessModule => match runtime.plugin() {
                Some(plugin) => self.in_process.start(&plugin).await.map(|()| None),
                None => Err(PlugvisorError::Internal(format!(
                    "instance {instance_id} has no loaded plugin"
                ))),
            },
            ExecutionKind::ExternalProcess => self
                .process
                .start(&slot.definition, instance_id, &workspace_id, &configuration)
                .await
                .map(|handle| {
                    let exit_rx = handle.exit_receiver();
                    *runtime = InstanceRuntime::Process(handle);
                    Some(exit_rx)
                }),
        };

        let mut record = slot.record.write().await;
        match result {
            Ok(exit_rx) => {
                record.transition(InstanceStatus::Running, "start")?;
                record.info.started_at = Some(Utc::now());
                record.info.stopped_at = None;
                record.info.last_error = None;
                if let Some(exit_rx) = exit_rx {
                    record.generation += 1;
                    spawn_exit_watcher(
                        Arc::clone(&slot),
                        Arc::clone(&self.process),
                        record.generation,
                        exit_rx,
                    );
                }
                tracing::info!(instance_id = %instance_id, "plugin instance running");
                Ok(())
            }
            Err(e) => {
                record.fail(&e);
                Err(e)
            }
        }
    }

    /// `Running → Stopped`.
    pub async fn stop(&self, instance_id: &str) -> Result<(), PlugvisorError> {
        let slot = self.slot(instance_id)?;
        let mut runtime = acquire(&slot, instance_id, "stop", Acquire::FailFast).await?;
        self.stop_locked(&slot, &mut runtime, instance_id).await
    }

    async fn stop_locked(
        &self,
        slot: &InstanceSlot,
        runtime: &mut InstanceRuntime,
        instance_id: &str,
    ) -> Result<(), PlugvisorError> {
        {
            let mut record = slot.record.write().await;
            if record.status() != InstanceStatus::Running {
                return Err(record.invalid_state("stop"));
            }
            record.transition(InstanceStatus::Stopping, "stop")?;
        }

        let result = match slot.definition.execution_kind {
            ExecutionKind::InProcessModule => match runtime.plugin() {
                Some(plugin) => self.in_process.stop(&plugin).await.map(|()| None),
                None => Err(PlugvisorError::Internal(format!(
                    "instance {instance_id} has no loaded plugin"
                ))),
            },
            ExecutionKind::ExternalProcess => match runtime.take_process() {
                Some(handle) => self.process.stop(handle).await.map(Some),
                None => Ok(None),
            },
        };

        let mut record = slot.record.write().await;
        match result {
            Ok(outcome) => {
                record.transition(InstanceStatus::Stopped, "stop")?;
                record.info.stopped_at = Some(Utc::now());
                // A signal-terminated process has no code; only a real
                // non-zero code counts as a failure.
                if let Some(outcome) = outcome.filter(|o| matches!(o.code, Some(code) if code != 0)) {
                    tracing::warn!(
                        instance_id = %instance_id,
                        %outcome,
                        "plugin process reported a failure while stopping"
                    );
                    record.info.last_error = Some(outcome.to_string());
                }
                tracing::info!(instance_id = %instance_id, "plugin instance stopped");
                Ok(())
            }
            Err(e) => {
                record.fail(&e);
                Err(e)
            }
        }
    }

    /// Stop the instance if it is running, release everything it holds and
    /// forget it.
    ///
    /// Failures while stopping or releasing are logged; the instance is
    /// removed regardless.
    pub async fn dispose(&self, instance_id: &str) -> Result<(), PlugvisorError> {
        self.dispose_with(instance_id, Acquire::FailFast).await
    }

    async fn dispose_with(&self, instance_id: &str, mode: Acquire) -> Result<(), PlugvisorError> {
        let slot = self.slot(instance_id)?;
        let mut runtime = acquire(&slot, instance_id, "dispose", mode).await?;

        let running = slot.record.read().await.status() == InstanceStatus::Running;
        if running && let Err(e) = self.stop_locked(&slot, &mut runtime, instance_id).await {
            tracing::warn!(instance_id = %instance_id, error = %e, "stop during dispose failed");
        }

        if let Err(e) = slot
            .record
            .write()
            .await
            .transition(InstanceStatus::Disposing, "dispose")
        {
            tracing::warn!(instance_id = %instance_id, error = %e, "disposing from an unexpected state");
        }

        match std::mem::take(&mut *runtime) {
            InstanceRuntime::InProcess(plugin) => {
                if let Err(e) = self.in_process.dispose(&plugin).await {
                    tracing::warn!(instance_id = %instance_id, error = %e, "plugin dispose hook failed");
                }
            }
            InstanceRuntime::Process(handle) => {
                if let Err(e) = self.process.stop(handle).await {
                    tracing::warn!(instance_id = %instance_id, error = %e, "failed to stop plugin process");
                }
            }
            InstanceRuntime::Idle => {}
        }

        {
            let mut record = slot.record.write().await;
            if record.transition(InstanceStatus::Disposed, "dispose").is_err() {
                record.info.status = InstanceStatus::Disposed;
            }
        }
        self.instances.remove(instance_id);
        tracing::info!(instance_id = %instance_id, "plugin instance disposed");
        Ok(())
    }

    /// Forward a command to a running in-process instance.
    pub async fn execute_command(
        &self,
        instance_id: &str,
        command: &str,
        payload: Value,
    ) -> Result<Value, PlugvisorError> {
        let slot = self.slot(instance_id)?;
        let plugin = {
            let runtime = slot.runtime.lock().await;
            let record = slot.record.read().await;
            let plugin = match slot.definition.execution_kind {
                ExecutionKind::InProcessModule if record.status() == InstanceStatus::Running => {
                    runtime.plugin()
                }
                _ => None,
            };
            plugin.ok_or_else(|| record.invalid_state("execute a command on"))?
        };

        tracing::debug!(instance_id = %instance_id, command = %command, "executing plugin command");
        self.in_process.execute_command(&plugin, command, payload).await
    }

    /// Current status, or `None` for unknown ids.
    pub async fn status(&self, instance_id: &str) -> Option<InstanceStatus> {
        let slot = self.slot(instance_id).ok()?;
        let status = slot.record.read().await.status();
        Some(status)
    }

    pub async fn info(&self, instance_id: &str) -> Option<InstanceInfo> {
        let slot = self.slot(instance_id).ok()?;
        let info = slot.record.read().await.info.clone();
        Some(info)
    }

    /// The configuration document the instance was created with.
    pub async fn configuration(&self, instance_id: &str) -> Option<String> {
        let slot = self.slot(instance_id).ok()?;
        let configuration = slot.record.read().await.configuration.clone();
        Some(configuration)
    }

    /// Instances in `workspace_id` (case-insensitive), oldest first.
    pub async fn list_by_workspace(&self, workspace_id: &str) -> Vec<InstanceInfo> {
        let workspace_id = workspace_id.trim();
        if workspace_id.is_empty() {
            return Vec::new();
        }
        let mut infos = self.list_all().await;
        infos.retain(|info| info.workspace_id.eq_ignore_ascii_case(workspace_id));
        infos
    }

    /// Every instance, oldest first.
    pub async fn list_all(&self) -> Vec<InstanceInfo> {
        let slots: Vec<Arc<InstanceSlot>> =
            self.instances.iter().map(|e| Arc::clone(e.value())).collect();
        let mut infos = Vec::with_capacity(slots.len());
        for slot in slots {
            infos.push(slot.record.read().await.info.clone());
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        infos
    }

    /// OS process id of a running external instance.
    pub async fn process_id(&self, instance_id: &str) -> Option<u32> {
        let slot = self.slot(instance_id).ok()?;
        let runtime = slot.runtime.lock().await;
        match &*runtime {
            InstanceRuntime::Process(handle) => handle.pid(),
            _ => None,
        }
    }

    /// The configuration file handed to a running external instance.
    pub async fn ephemeral_config_path(&self, instance_id: &str) -> Option<PathBuf> {
        let slot = self.slot(instance_id).ok()?;
        let runtime = slot.runtime.lock().await;
        match &*runtime {
            InstanceRuntime::Process(handle) => Some(handle.config_path().to_path_buf()),
            _ => None,
        }
    }

    /// Resolves once the instance is no longer running or starting.
    pub async fn wait_until_not_running(&self, instance_id: &str, poll: Duration) {
        while let Some(InstanceStatus::Running | InstanceStatus::Starting) =
            self.status(instance_id).await
        {
            tokio::time::sleep(poll).await;
        }
    }

    /// Dispose every instance, waiting for in-flight life-cycle calls.
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        if ids.is_empty() {
            return;
        }
        tracing::info!(count = ids.len(), "disposing all plugin instances");
        for id in ids {
            match self.dispose_with(&id, Acquire::Wait).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(instance_id = %id, error = %e, "failed to dispose instance during shutdown");
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn slot(&self, instance_id: &str) -> Result<Arc<InstanceSlot>, PlugvisorError> {
        self.instances
            .get(instance_id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| PlugvisorError::instance_not_found(instance_id))
    }
}

async fn acquire<'a>(
    slot: &'a InstanceSlot,
    instance_id: &str,
    operation: &'static str,
    mode: Acquire,
) -> Result<MutexGuard<'a, InstanceRuntime>, PlugvisorError> {
    match mode {
        Acquire::FailFast => slot.runtime.try_lock().map_err(|_| PlugvisorError::Busy {
            instance_id: instance_id.to_string(),
            operation,
        }),
        Acquire::Wait => Ok(slot.runtime.lock().await),
    }
}

const WATCHER_RETRY: Duration = Duration::from_millis(10);

/// Watch one run of an external plugin and record an exit nobody asked for.
///
/// Stops and restarts move the record out of `Running` or bump its
/// generation, so a watcher whose run is over does nothing.
fn spawn_exit_watcher(
    slot: Arc<InstanceSlot>,
    runner: Arc<ProcessPluginRunner>,
    generation: u64,
    mut exit_rx: watch::Receiver<Option<ExitOutcome>>,
) {
    tokio::spawn(async move {
        let outcome = wait_for_exit(&mut exit_rx).await;

        // Only ever try_lock: a queued waiter is handed the mutex ahead of the
        // caller's next life-cycle call, which would then fail with `Busy`.
        let mut runtime = loop {
            {
                let record = slot.record.read().await;
                if record.generation != generation || record.status() != InstanceStatus::Running {
                    return;
                }
            }
            match slot.runtime.try_lock() {
                Ok(guard) => break guard,
                Err(_) => tokio::time::sleep(WATCHER_RETRY).await,
            }
        };
        let mut record = slot.record.write().await;
        if record.generation != generation || record.status() != InstanceStatus::Running {
            return;
        }
        if let Some(handle) = runtime.take_process() {
            runner.cleanup_exited(handle);
        }

        let instance_id = record.info.instance_id.clone();
        if outcome.success() {
            let stopped = record
                .transition(InstanceStatus::Stopping, "stop")
                .and_then(|()| record.transition(InstanceStatus::Stopped, "stop"));
            match stopped {
                Ok(()) => {
                    record.info.stopped_at = Some(Utc::now());
                    tracing::info!(instance_id = %instance_id, "plugin process exited on its own");
                }
                Err(e) => record.fail(&e),
            }
        } else {
            record.fail_with(outcome.to_string());
        }
    });
}
