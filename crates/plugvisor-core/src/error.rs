// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Plugvisor plugin host.

use thiserror::Error;

use crate::types::InstanceStatus;

/// The primary error type used across the catalog, runners, and instance registry.
#[derive(Debug, Error)]
pub enum PlugvisorError {
    /// An unknown plugin id or instance id was referenced.
    #[error("{kind} not found: {id}")]
    NotFound { kind: NotFoundKind, id: String },

    /// A life-cycle operation was attempted from a state that does not allow it.
    #[error("cannot {operation} instance {instance_id} while it is {status}")]
    InvalidState {
        instance_id: String,
        operation: &'static str,
        status: InstanceStatus,
    },

    /// Another life-cycle operation is already acting on this instance.
    #[error("cannot {operation} instance {instance_id}: another life-cycle operation is in progress")]
    Busy {
        instance_id: String,
        operation: &'static str,
    },

    /// Module/entry type resolution or plugin construction failed.
    #[error("failed to load plugin {plugin_id}: {message}")]
    LoadFailure { plugin_id: String, message: String },

    /// The external plugin process could not be spawned.
    #[error("failed to launch plugin {plugin_id}: {message}")]
    LaunchFailure {
        plugin_id: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A configuration document does not satisfy the plugin's schema.
    #[error("configuration for plugin {plugin_id} is invalid: {}", errors.join("; "))]
    ValidationFailure {
        plugin_id: String,
        errors: Vec<String>,
    },

    /// A generated instance id collided with an existing one.
    #[error("instance id already registered: {id}")]
    Conflict { id: String },

    /// Plugin code reported an error or panicked.
    #[error("plugin error: {message}")]
    Plugin { message: String },

    /// Filesystem errors (ephemeral config artifacts, manifests).
    #[error("i/o error: {message}")]
    Io {
        message: String,
        source: Option<std::io::Error>,
    },

    /// Configuration errors (malformed manifests, host settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlugvisorError {
    /// Convenience constructor for an unknown plugin definition.
    pub fn plugin_not_found(id: impl Into<String>) -> Self {
        PlugvisorError::NotFound {
            kind: NotFoundKind::Plugin,
            id: id.into(),
        }
    }

    /// Convenience constructor for an unknown instance.
    pub fn instance_not_found(id: impl Into<String>) -> Self {
        PlugvisorError::NotFound {
            kind: NotFoundKind::Instance,
            id: id.into(),
        }
    }

    /// Convenience constructor for errors raised by plugin code.
    pub fn plugin(message: impl Into<String>) -> Self {
        PlugvisorError::Plugin {
            message: message.into(),
        }
    }

    /// Wraps an `std::io::Error` with a context message.
    pub fn io(context: impl std::fmt::Display, source: std::io::Error) -> Self {
        PlugvisorError::Io {
            message: format!("{context}: {source}"),
            source: Some(source),
        }
    }

    /// Returns true if this error means the referenced plugin or instance does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlugvisorError::NotFound { .. })
    }
}

/// What kind of entity a [`PlugvisorError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum NotFoundKind {
    #[strum(serialize = "plugin")]
    Plugin,
    #[strum(serialize = "plugin instance")]
    Instance,
}
