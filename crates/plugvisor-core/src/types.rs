// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the catalog, the runners, and the instance registry.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a plugin's code is executed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ExecutionKind {
    /// Runs inside the host process, resolved through the module registry.
    #[default]
    #[strum(
        to_string = "InProcessModule",
        serialize = "in_process",
        serialize = "inprocess",
        serialize = "module",
        serialize = "library"
    )]
    InProcessModule,
    /// Runs as a supervised child program.
    #[strum(
        to_string = "ExternalProcess",
        serialize = "external",
        serialize = "process",
        serialize = "executable"
    )]
    ExternalProcess,
}

/// Life-cycle states of a plugin instance.
///
/// Ids the registry does not know about have no status at all
/// (`PluginInstanceRegistry::status` returns `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum InstanceStatus {
    Created,
    Initializing,
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
    Disposing,
    Disposed,
    Error,
}

impl InstanceStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Error` is reachable from every state that is neither terminal nor
    /// already disposing; from `Error` only disposal is possible.
    pub fn can_transition_to(self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;

        if next == Error {
            return !matches!(self, Disposing | Disposed | Error);
        }

        matches!(
            (self, next),
            (Created, Initializing)
                | (Created, Starting)
                | (Created, Disposing)
                | (Initializing, Initialized)
                | (Initialized, Starting)
                | (Initialized, Disposing)
                | (Starting, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Stopped, Starting)
                | (Stopped, Disposing)
                | (Disposing, Disposed)
                | (Error, Disposing)
        )
    }

    /// States from which `start` is accepted for the given execution kind.
    pub fn can_start(self, kind: ExecutionKind) -> bool {
        match kind {
            ExecutionKind::InProcessModule => {
                matches!(self, InstanceStatus::Initialized | InstanceStatus::Stopped)
            }
            ExecutionKind::ExternalProcess => matches!(
                self,
                InstanceStatus::Created | InstanceStatus::Initialized | InstanceStatus::Stopped
            ),
        }
    }
}

/// Severity levels a plugin can log at through its host context.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

/// Result of validating a configuration document against a plugin's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the document satisfied the schema.
    pub is_valid: bool,
    /// Summary message when validation failed; empty when valid.
    pub error_message: String,
    /// One message per failing constraint.
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// A successful validation.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error_message: String::new(),
            errors: Vec::new(),
        }
    }

    /// A failed validation with a summary message and per-constraint errors.
    pub fn invalid(error_message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            error_message: error_message.into(),
            errors,
        }
    }
}
