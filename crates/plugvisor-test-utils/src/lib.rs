// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Plugvisor integration tests.
//!
//! [`TestHarness`] wires a catalog, validator and instance registry over a
//! temporary plugin directory, so tests run without touching the user's
//! configuration or plugin folders.
//!
//! # Components
//!
//! - [`TestHarness`] - Isolated host stack with its own temp directories
//! - [`fixtures`] - Manifest documents for the built-in and shell plugins

pub mod fixtures;
pub mod harness;

pub use harness::{TestHarness, TestHarnessBuilder};
