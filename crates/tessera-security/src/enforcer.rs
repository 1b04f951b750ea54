// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fail-closed capability enforcement.
//!
//! The enforcer answers one question: may the plugin bound to this execution
//! context perform this action? Host code runs unbound and is always allowed.
//! A bound plugin with no grant is denied unless a default grant is configured.

use std::sync::Arc;

use tessera_config::SandboxConfig;
use tessera_core::{CapabilityGate, CapabilityRequest, TesseraError};
use tracing::{debug, warn};

use crate::binding::{BindingGuard, ExecutionContext};
use crate::registry::{CapabilityRegistry, CompiledGrant};

/// Checks privileged requests against the [`CapabilityRegistry`].
#[derive(Debug)]
pub struct SandboxEnforcer {
    registry: Arc<CapabilityRegistry>,
    enabled: bool,
    default_grant: Option<Arc<CompiledGrant>>,
}

impl SandboxEnforcer {
    /// An enabled, fail-closed enforcer.
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            enabled: true,
            default_grant: None,
        }
    }

    /// Build an enforcer from the `[sandbox]` configuration section.
    pub fn from_config(
        config: &SandboxConfig,
        registry: Arc<CapabilityRegistry>,
    ) -> Result<Self, TesseraError> {
        let default_grant = config
            .default_grant
            .clone()
            .map(|grant| CompiledGrant::compile("<default>", grant).map(Arc::new))
            .transpose()?;

        if !config.enabled {
            warn!("capability sandbox disabled: every privileged request will be allowed");
        }

        Ok(Self {
            registry,
            enabled: config.enabled,
            default_grant,
        })
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bind `plugin_id` to `context` for the lifetime of the returned guard.
    pub fn bind(
        &self,
        context: &Arc<ExecutionContext>,
        plugin_id: &str,
    ) -> Result<BindingGuard, TesseraError> {
        context.bind(plugin_id)
    }

    /// Check `request` for whichever plugin is bound to `context`.
    pub fn check(
        &self,
        context: &ExecutionContext,
        request: &CapabilityRequest,
    ) -> Result<(), TesseraError> {
        match context.bound_plugin() {
            None => Ok(()),
            Some(plugin_id) => self.check_plugin(&plugin_id, request),
        }
    }

    /// Check `request` as if `plugin_id` were bound.
    pub fn check_plugin(
        &self,
        plugin_id: &str,
        request: &CapabilityRequest,
    ) -> Result<(), TesseraError> {
        if !self.enabled {
            return Ok(());
        }

        let grant = self
            .registry
            .compiled(plugin_id)
            .or_else(|| self.default_grant.clone());

        let verdict = match grant {
            None => Err("no grant registered".to_string()),
            Some(grant) => grant.evaluate(request),
        };

        match verdict {
            Ok(()) => {
                debug!(plugin_id = %plugin_id, capability = %request, "capability allowed");
                Ok(())
            }
            Err(reason) => {
                warn!(
                    plugin_id = %plugin_id,
                    capability = %request,
                    reason = %reason,
                    "capability denied"
                );
                Err(TesseraError::PermissionDenied {
                    plugin_id: plugin_id.to_string(),
                    reason,
                })
            }
        }
    }

    /// A gate for plugin code running under `context` as `plugin_id`.
    pub fn gate(
        self: &Arc<Self>,
        context: Arc<ExecutionContext>,
        plugin_id: impl Into<Arc<str>>,
    ) -> Arc<dyn CapabilityGate> {
        Arc::new(BoundGate {
            enforcer: Arc::clone(self),
            context,
            plugin_id: plugin_id.into(),
        })
    }
}

/// The gate handed to plugin code through its `PluginContext`.
///
/// Denies every request once the execution context no longer carries the
/// plugin's binding, so a context leaked past its work unit grants nothing.
#[derive(Debug)]
pub struct BoundGate {
    enforcer: Arc<SandboxEnforcer>,
    context: Arc<ExecutionContext>,
    plugin_id: Arc<str>,
}

impl CapabilityGate for BoundGate {
    fn check(&self, request: &CapabilityRequest) -> Result<(), TesseraError> {
        if !self.context.is_bound_to(&self.plugin_id) {
            warn!(plugin_id = %self.plugin_id, capability = %request, "capability check outside active binding");
            return Err(TesseraError::PermissionDenied {
                plugin_id: self.plugin_id.to_string(),
                reason: "execution binding is no longer active".to_string(),
            });
        }
        self.enforcer.check(&self.context, request)
    }
}
