// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin execution and instance life-cycle management.
//!
//! [`PluginInstanceRegistry`] owns every plugin instance and drives it
//! through the state machine in [`plugvisor_core::InstanceStatus`]. The two
//! runners do the actual work: [`InProcessPluginRunner`] calls into plugin
//! objects built by the module registry, [`ProcessPluginRunner`] launches
//! and supervises external plugin programs.

pub mod host;
pub mod in_process;
pub mod instance;
pub mod process;
pub mod registry;

pub use host::RuntimeHostContext;
pub use in_process::InProcessPluginRunner;
pub use instance::InstanceInfo;
pub use process::{ExitOutcome, ProcessHandle, ProcessPluginRunner, split_args, substitute_placeholders};
pub use registry::{PluginInstanceRegistry, RegistrySettings};
