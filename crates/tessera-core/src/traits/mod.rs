// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the host and plugin code.
//!
//! [`Plugin`] is the externally supplied unit of work driven by the lifecycle
//! controller. [`CapabilityGate`] is the sandbox surface plugin code sees
//! through its [`PluginContext`](crate::context::PluginContext).

pub mod gate;
pub mod plugin;

pub use gate::CapabilityGate;
pub use plugin::Plugin;
