// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tessera integration tests.
//!
//! Provides a [`ScriptedPlugin`] whose lifecycle calls succeed, fail, panic,
//! exercise capability checks, or block on demand, plus descriptor and
//! configuration fixtures.

pub mod fixtures;
pub mod scripted;

pub use fixtures::{config, descriptor, manifest_toml};
pub use scripted::{HoldGate, Outcome, ScriptedPlugin};
