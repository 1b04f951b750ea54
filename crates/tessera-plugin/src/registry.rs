// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The host's single entry point for plugin management.
//!
//! `PluginRegistry` owns one [`PluginLifecycleController`] per registered
//! plugin and enforces the cross-instance rules: unique ids, declared
//! dependencies, per-type instance limits, and grant requirements at start.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use tessera_config::TesseraConfig;
use tessera_core::{
    CapabilityGrant, ConfigMap, HealthStatus, MetricsMap, Operation, Plugin, PluginDescriptor,
    PluginState, PluginType, TesseraError,
};
use tessera_security::{CapabilityRegistry, SandboxEnforcer};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::events::{EventSink, PluginEvent};
use crate::lifecycle::{InstanceSnapshot, PluginLifecycleController};
use crate::monitor::PerformanceLimits;
use crate::taxonomy::PluginTypeRegistry;

const DEFAULT_HOST_API_VERSION: u32 = 1;
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Summary of one registered plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub descriptor: PluginDescriptor,
    pub state: PluginState,
    pub health: HealthStatus,
}

/// Registry of plugin instances.
pub struct PluginRegistry {
    types: PluginTypeRegistry,
    enforcer: Arc<SandboxEnforcer>,
    runtime: Handle,
    host_api_version: u32,
    events: EventSink,
    limits: PerformanceLimits,
    entries: RwLock<HashMap<String, Arc<PluginLifecycleController>>>,
    // Serializes start admission so per-type limits hold under concurrent starts.
    start_admission: Mutex<()>,
}

impl PluginRegistry {
    /// Create a registry on the current tokio runtime with host API 1.
    pub fn new(types: PluginTypeRegistry, enforcer: Arc<SandboxEnforcer>) -> Result<Self, TesseraError> {
        let runtime = Handle::try_current()
            .map_err(|e| TesseraError::Internal(format!("plugin registry needs a tokio runtime: {e}")))?;
        Ok(Self::with_runtime(
            types,
            enforcer,
            runtime,
            DEFAULT_HOST_API_VERSION,
            DEFAULT_EVENT_CAPACITY,
        ))
    }

    /// Create a registry that runs plugin work on `runtime`.
    pub fn with_runtime(
        types: PluginTypeRegistry,
        enforcer: Arc<SandboxEnforcer>,
        runtime: Handle,
        host_api_version: u32,
        event_capacity: usize,
    ) -> Self {
        Self {
            types,
            enforcer,
            runtime,
            host_api_version,
            events: EventSink::new(event_capacity),
            limits: PerformanceLimits::default(),
            entries: RwLock::new(HashMap::new()),
            start_admission: Mutex::new(()),
        }
    }

    /// Build a registry, type table and enforcer from configuration on the
    /// current tokio runtime.
    pub fn from_config(
        config: &TesseraConfig,
        capabilities: Arc<CapabilityRegistry>,
    ) -> Result<Self, TesseraError> {
        let runtime = Handle::try_current()
            .map_err(|e| TesseraError::Internal(format!("plugin registry needs a tokio runtime: {e}")))?;
        let types = PluginTypeRegistry::with_overrides(&config.types)?;
        let enforcer = Arc::new(SandboxEnforcer::from_config(&config.sandbox, capabilities)?);
        Ok(Self::with_runtime(
            types,
            enforcer,
            runtime,
            config.host.api_version,
            config.lifecycle.event_capacity,
        )
        .with_performance_limits(PerformanceLimits::from(&config.lifecycle)))
    }

    /// Execution thresholds handed to plugins registered from now on.
    pub fn with_performance_limits(mut self, limits: PerformanceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn performance_limits(&self) -> &PerformanceLimits {
        &self.limits
    }

    pub fn types(&self) -> &PluginTypeRegistry {
        &self.types
    }

    pub fn enforcer(&self) -> &Arc<SandboxEnforcer> {
        &self.enforcer
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        self.enforcer.registry()
    }

    pub fn host_api_version(&self) -> u32 {
        self.host_api_version
    }

    /// Subscribe to host events. Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    /// Register a plugin. The instance starts in UNLOADED.
    pub fn register(&self, descriptor: PluginDescriptor, plugin: Arc<dyn Plugin>) -> Result<(), TesseraError> {
        descriptor.validate()?;
        descriptor.check_api(self.host_api_version)?;

        let mut entries = self.write_entries()?;
        if entries.contains_key(&descriptor.id) {
            return Err(TesseraError::DuplicateRegistration(descriptor.id));
        }
        if let Some(missing) = descriptor
            .dependencies
            .iter()
            .find(|dep| !entries.contains_key(dep.as_str()))
        {
            return Err(TesseraError::MissingDependency {
                plugin_id: descriptor.id.clone(),
                dependency: missing.clone(),
            });
        }

        let plugin_type = descriptor.plugin_type;
        let limit = self.types.max_instances(plugin_type);
        let registered = entries
            .values()
            .filter(|c| c.descriptor().plugin_type == plugin_type)
            .count();
        if !limit.admits(registered) {
            return Err(TesseraError::TypeLimitExceeded {
                plugin_type,
                limit: limit.as_usize().unwrap_or(usize::MAX),
            });
        }

        let id = descriptor.id.clone();
        let controller = PluginLifecycleController::with_limits(
            descriptor,
            plugin,
            Arc::clone(&self.enforcer),
            self.runtime.clone(),
            self.types.is_critical(plugin_type),
            self.events.clone(),
            self.limits,
        );
        entries.insert(id.clone(), controller);
        drop(entries);

        info!(plugin_id = %id, plugin_type = %plugin_type, "plugin registered");
        self.events.emit(PluginEvent::Registered {
            plugin_id: id,
            plugin_type,
        });
        Ok(())
    }

    /// Remove an UNLOADED plugin that no other plugin depends on.
    ///
    /// The controller is retired under its operation lock, so callers still
    /// holding it from [`controller`](Self::controller) cannot revive it.
    pub fn unregister(&self, plugin_id: &str) -> Result<PluginDescriptor, TesseraError> {
        let mut entries = self.write_entries()?;
        let controller = entries
            .get(plugin_id)
            .ok_or_else(|| TesseraError::UnregisteredPlugin(plugin_id.to_string()))?;

        let state = controller.state();
        if state != PluginState::Unloaded {
            return Err(TesseraError::InvalidStateTransition {
                plugin_id: plugin_id.to_string(),
                operation: Operation::Destroy,
                from: state,
            });
        }

        let mut dependents: Vec<String> = entries
            .values()
            .filter(|c| c.descriptor().dependencies.contains(plugin_id))
            .map(|c| c.id().to_string())
            .collect();
        if !dependents.is_empty() {
            dependents.sort();
            return Err(TesseraError::HasDependents {
                plugin_id: plugin_id.to_string(),
                dependents,
            });
        }
        controller.retire()?;

        let removed = entries
            .remove(plugin_id)
            .ok_or_else(|| TesseraError::UnregisteredPlugin(plugin_id.to_string()))?;
        drop(entries);

        info!(plugin_id = %plugin_id, "plugin unregistered");
        self.events.emit(PluginEvent::Unregistered {
            plugin_id: plugin_id.to_string(),
        });
        Ok(removed.descriptor().clone())
    }

    /// The lifecycle controller for `plugin_id`.
    pub fn controller(&self, plugin_id: &str) -> Result<Arc<PluginLifecycleController>, TesseraError> {
        self.read_entries()?
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| TesseraError::UnregisteredPlugin(plugin_id.to_string()))
    }

    pub fn get(&self, plugin_id: &str) -> Option<PluginInfo> {
        self.controller(plugin_id).ok().map(|c| info_of(&c))
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.controller(plugin_id).is_ok()
    }

    /// All registered plugins, sorted by id.
    pub fn list(&self) -> Vec<PluginInfo> {
        let mut all: Vec<PluginInfo> = match self.read_entries() {
            Ok(entries) => entries.values().map(|c| info_of(c)).collect(),
            Err(err) => {
                warn!(error = %err, "listing plugins failed");
                Vec::new()
            }
        };
        all.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));
        all
    }

    /// Registered plugins of one type, sorted by id.
    pub fn list_by_type(&self, plugin_type: PluginType) -> Vec<PluginInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.descriptor.plugin_type == plugin_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        match self.read_entries() {
            Ok(entries) => entries.len(),
            Err(err) => {
                warn!(error = %err, "counting plugins failed");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn initialize(&self, plugin_id: &str, config: ConfigMap) -> Result<(), TesseraError> {
        self.controller(plugin_id)?.initialize(config).await
    }

    /// Start a plugin once its dependencies run, its grant exists (for types
    /// that require one), and its type has room for another active instance.
    ///
    /// A plugin that cannot start from its current state is refused before
    /// any of those checks run.
    pub async fn start(&self, plugin_id: &str) -> Result<(), TesseraError> {
        let pending = {
            let controller = self.controller(plugin_id)?;
            let state = controller.state();
            if state.is_transient() {
                return Err(TesseraError::OperationInProgress {
                    plugin_id: plugin_id.to_string(),
                });
            }
            if Operation::Start.transition_from(state).is_none() {
                return Err(TesseraError::InvalidStateTransition {
                    plugin_id: plugin_id.to_string(),
                    operation: Operation::Start,
                    from: state,
                });
            }
            let descriptor = controller.descriptor();

            for dependency in &descriptor.dependencies {
                let running = self
                    .controller(dependency)
                    .map(|dep| dep.state() == PluginState::Running)
                    .unwrap_or(false);
                if !running {
                    return Err(TesseraError::DependencyNotRunning {
                        plugin_id: plugin_id.to_string(),
                        dependency: dependency.clone(),
                    });
                }
            }

            let plugin_type = descriptor.plugin_type;
            if self.enforcer.is_enabled()
                && self.types.requires_grant(plugin_type)
                && !self.capabilities().contains(plugin_id)
            {
                return Err(TesseraError::PermissionDenied {
                    plugin_id: plugin_id.to_string(),
                    reason: format!("plugin type {plugin_type} requires a capability grant before start"),
                });
            }

            let _admission = self
                .start_admission
                .lock()
                .map_err(|e| TesseraError::Internal(format!("start admission lock poisoned: {e}")))?;
            let limit = self.types.max_instances(plugin_type);
            let active = self
                .read_entries()?
                .values()
                .filter(|c| {
                    c.id() != plugin_id
                        && c.descriptor().plugin_type == plugin_type
                        && c.state().is_active()
                })
                .count();
            if !limit.admits(active) {
                return Err(TesseraError::TypeLimitExceeded {
                    plugin_type,
                    limit: limit.as_usize().unwrap_or(usize::MAX),
                });
            }
            controller.start()
        };
        pending.await
    }

    pub async fn stop(&self, plugin_id: &str) -> Result<(), TesseraError> {
        self.controller(plugin_id)?.stop().await
    }

    pub async fn destroy(&self, plugin_id: &str) -> Result<(), TesseraError> {
        self.controller(plugin_id)?.destroy().await
    }

    pub async fn update_configuration(&self, plugin_id: &str, config: ConfigMap) -> Result<(), TesseraError> {
        self.controller(plugin_id)?.update_configuration(config).await
    }

    pub async fn handle_event(
        &self,
        plugin_id: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<(), TesseraError> {
        self.controller(plugin_id)?.handle_event(event_type, payload).await
    }

    pub fn state(&self, plugin_id: &str) -> Result<PluginState, TesseraError> {
        Ok(self.controller(plugin_id)?.state())
    }

    pub fn health(&self, plugin_id: &str) -> Result<HealthStatus, TesseraError> {
        Ok(self.controller(plugin_id)?.health())
    }

    pub fn configuration(&self, plugin_id: &str) -> Result<ConfigMap, TesseraError> {
        Ok(self.controller(plugin_id)?.configuration())
    }

    pub fn metrics(&self, plugin_id: &str) -> Result<MetricsMap, TesseraError> {
        Ok(self.controller(plugin_id)?.metrics())
    }

    pub fn snapshot(&self, plugin_id: &str) -> Result<Arc<InstanceSnapshot>, TesseraError> {
        Ok(self.controller(plugin_id)?.snapshot())
    }

    /// Register or replace the capability grant for `plugin_id`.
    pub fn grant_capabilities(&self, plugin_id: &str, grant: CapabilityGrant) -> Result<(), TesseraError> {
        self.capabilities().grant(plugin_id, grant)?;
        self.events.emit(PluginEvent::CapabilitiesGranted {
            plugin_id: plugin_id.to_string(),
        });
        Ok(())
    }

    /// Remove the capability grant for `plugin_id`. Later checks deny.
    pub fn revoke_capabilities(&self, plugin_id: &str) -> Result<Option<CapabilityGrant>, TesseraError> {
        let revoked = self.capabilities().revoke(plugin_id)?;
        if revoked.is_some() {
            self.events.emit(PluginEvent::CapabilitiesRevoked {
                plugin_id: plugin_id.to_string(),
            });
        }
        Ok(revoked)
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<PluginLifecycleController>>>, TesseraError>
    {
        self.entries
            .read()
            .map_err(|e| TesseraError::Internal(format!("plugin registry lock poisoned: {e}")))
    }

    fn write_entries(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<PluginLifecycleController>>>, TesseraError>
    {
        self.entries
            .write()
            .map_err(|e| TesseraError::Internal(format!("plugin registry lock poisoned: {e}")))
    }
}

fn info_of(controller: &PluginLifecycleController) -> PluginInfo {
    let snapshot = controller.snapshot();
    PluginInfo {
        descriptor: controller.descriptor().clone(),
        state: snapshot.state,
        health: snapshot.health,
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.len())
            .field("host_api_version", &self.host_api_version)
            .finish()
    }
}
