// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seam between the host and plugin code.

pub mod host;
pub mod plugin;

pub use host::HostContext;
pub use plugin::Plugin;
