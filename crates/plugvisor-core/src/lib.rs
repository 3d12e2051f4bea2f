// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Plugvisor plugin host.
//!
//! This crate provides the error type, the instance state machine, and the
//! traits at the boundary between the host and in-process plugin code.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{NotFoundKind, PlugvisorError};
pub use traits::{HostContext, Plugin};
pub use types::{ExecutionKind, InstanceStatus, LogLevel, ValidationResult};
