// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin registry, lifecycle controller, type table, and manifest parser.
//!
//! The [`PluginRegistry`] is the host's single entry point. It registers
//! descriptors against the [`PluginTypeRegistry`], drives each instance through
//! a [`PluginLifecycleController`], and routes privileged checks made by
//! plugin code through the sandbox enforcer.

pub mod events;
pub mod lifecycle;
pub mod manifest;
pub mod monitor;
pub mod registry;
pub mod taxonomy;

pub use events::{EventSink, PluginEvent};
pub use lifecycle::{InstanceSnapshot, PendingTransition, PluginLifecycleController};
pub use manifest::parse_plugin_descriptor;
pub use monitor::PerformanceLimits;
pub use registry::{PluginInfo, PluginRegistry};
pub use taxonomy::{InstanceLimit, PluginTypeRegistry, TypePolicy};
