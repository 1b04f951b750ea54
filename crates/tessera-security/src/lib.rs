// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability sandbox for the Tessera plugin host.
//!
//! Provides the copy-on-write grant registry with optional persistence,
//! explicit execution contexts that carry "which plugin is running", and the
//! fail-closed enforcer that checks privileged requests against grants.

pub mod binding;
pub mod enforcer;
pub mod pattern;
pub mod registry;
pub mod store;

pub use binding::{BindingGuard, ExecutionContext};
pub use enforcer::{BoundGate, SandboxEnforcer};
pub use pattern::PathPatterns;
pub use registry::{CapabilityRegistry, CompiledGrant};
pub use store::{GrantRecord, GrantStore, MemoryGrantStore, TomlGrantStore};
