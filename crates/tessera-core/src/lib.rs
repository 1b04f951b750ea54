// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tessera plugin host.
//!
//! This crate provides the data model (descriptors, lifecycle states, plugin
//! types, capability grants), the shared error type, and the trait seams
//! implemented by plugin code and by the sandbox.

pub mod capability;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use capability::{CapabilityGrant, CapabilityKind, CapabilityRequest};
pub use context::PluginContext;
pub use descriptor::PluginDescriptor;
pub use error::TesseraError;
pub use traits::{CapabilityGate, Plugin};
pub use types::{ConfigMap, HealthStatus, MetricsMap, Operation, PluginState, PluginType, Transition};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct DenyAll;

    impl CapabilityGate for DenyAll {
        fn check(&self, request: &CapabilityRequest) -> Result<(), TesseraError> {
            Err(TesseraError::PermissionDenied {
                plugin_id: "test".into(),
                reason: format!("{request} not granted"),
            })
        }
    }

    #[test]
    fn context_routes_checks_through_gate() {
        let ctx = PluginContext::new("test", Arc::new(DenyAll));
        let err = ctx.check_file_read("/etc/passwd").unwrap_err();
        assert!(err.is_permission_denied());
        assert!(err.to_string().contains("read '/etc/passwd'"));
        assert_eq!(ctx.plugin_id(), "test");
    }

    #[test]
    fn root_cause_looks_through_wrappers() {
        let denied = TesseraError::PermissionDenied {
            plugin_id: "p".into(),
            reason: "no grant registered".into(),
        };
        let failure = TesseraError::PluginFailure {
            plugin_id: "p".into(),
            operation: Operation::Start,
            message: denied.to_string(),
            source: Some(Box::new(denied)),
        };
        let critical = TesseraError::CriticalFailure {
            plugin_id: "p".into(),
            plugin_type: PluginType::Security,
            source: Box::new(failure),
        };
        assert!(critical.is_permission_denied());
        assert!(matches!(
            critical.root_cause(),
            TesseraError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn has_dependents_lists_all_names() {
        let err = TesseraError::HasDependents {
            plugin_id: "base".into(),
            dependents: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "plugin 'base' is required by: a, b");
    }

    #[test]
    fn plugin_trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn Plugin) {}
        fn _assert_gate_object_safe(_: &dyn CapabilityGate) {}
    }
}
