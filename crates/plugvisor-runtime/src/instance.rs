// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-instance state held by the registry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use plugvisor_core::{ExecutionKind, InstanceStatus, Plugin, PlugvisorError};
use plugvisor_plugin::PluginDefinition;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::process::ProcessHandle;

/// Read-only snapshot of a plugin instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub plugin_id: String,
    pub plugin_name: String,
    pub execution_kind: ExecutionKind,
    pub workspace_id: String,
    pub status: InstanceStatus,
    pub created_at: DateTime<Utc>,
    pub initialized_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Mutable bookkeeping for an instance. Guarded by a short-lived `RwLock`.
#[derive(Debug)]
pub(crate) struct InstanceRecord {
    pub(crate) info: InstanceInfo,
    pub(crate) configuration: String,
    /// Bumped every time an external process is launched, so an exit watcher
    /// can tell whether it still belongs to the current run.
    pub(crate) generation: u64,
}

impl InstanceRecord {
    pub(crate) fn new(
        instance_id: String,
        definition: &PluginDefinition,
        workspace_id: &str,
        configuration: String,
    ) -> Self {
        Self {
            info: InstanceInfo {
                instance_id,
                plugin_id: definition.id.clone(),
                plugin_name: definition.name.clone(),
                execution_kind: definition.execution_kind,
                workspace_id: workspace_id.to_string(),
                status: InstanceStatus::Created,
                created_at: Utc::now(),
                initialized_at: None,
                started_at: None,
                stopped_at: None,
                last_error: None,
            },
            configuration,
            generation: 0,
        }
    }

    pub(crate) fn status(&self) -> InstanceStatus {
        self.info.status
    }

    /// Move to `next` if the state machine allows it; otherwise leave the
    /// record untouched and report `InvalidState`.
    pub(crate) fn transition(
        &mut self,
        next: InstanceStatus,
        operation: &'static str,
    ) -> Result<(), PlugvisorError> {
        let current = self.info.status;
        if !current.can_transition_to(next) {
            return Err(PlugvisorError::InvalidState {
                instance_id: self.info.instance_id.clone(),
                operation,
                status: current,
            });
        }
        tracing::debug!(
            instance_id = %self.info.instance_id,
            from = %current,
            to = %next,
            "instance status change"
        );
        self.info.status = next;
        Ok(())
    }

    /// Put the instance into `Error` and remember why.
    pub(crate) fn fail(&mut self, error: &PlugvisorError) {
        self.fail_with(error.to_string());
    }

    pub(crate) fn fail_with(&mut self, message: String) {
        if self.info.status.can_transition_to(InstanceStatus::Error) {
            self.info.status = InstanceStatus::Error;
        }
        tracing::warn!(
            instance_id = %self.info.instance_id,
            plugin_id = %self.info.plugin_id,
            error = %message,
            "plugin instance failed"
        );
        self.info.last_error = Some(message);
    }

    pub(crate) fn invalid_state(&self, operation: &'static str) -> PlugvisorError {
        PlugvisorError::InvalidState {
            instance_id: self.info.instance_id.clone(),
            operation,
            status: self.info.status,
        }
    }
}

/// The execution resources of an instance. At most one kind is ever held.
#[derive(Default)]
pub(crate) enum InstanceRuntime {
    #[default]
    Idle,
    InProcess(Arc<dyn Plugin>),
    Process(ProcessHandle),
}

impl InstanceRuntime {
    pub(crate) fn plugin(&self) -> Option<Arc<dyn Plugin>> {
        match self {
            InstanceRuntime::InProcess(plugin) => Some(Arc::clone(plugin)),
            _ => None,
        }
    }

    pub(crate) fn take_process(&mut self) -> Option<ProcessHandle> {
        match std::mem::take(self) {
            InstanceRuntime::Process(handle) => Some(handle),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// One registry entry.
///
/// `record` serves queries and is only ever held briefly. `runtime` is held
/// for the whole duration of a life-cycle call, which serializes life-cycle
/// calls on the same instance.
pub(crate) struct InstanceSlot {
    pub(crate) definition: PluginDefinition,
    pub(crate) record: RwLock<InstanceRecord>,
    pub(crate) runtime: Mutex<InstanceRuntime>,
}

impl InstanceSlot {
    pub(crate) fn new(definition: PluginDefinition, record: InstanceRecord) -> Self {
        Self {
            definition,
            record: RwLock::new(record),
            runtime: Mutex::new(InstanceRuntime::Idle),
        }
    }
}
