// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tessera plugin host.

use thiserror::Error;

use crate::types::{Operation, PluginState, PluginType};

/// The primary error type used across the registry, lifecycle controller,
/// and sandbox enforcer.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// The requested operation is not legal from the instance's current state.
    #[error("plugin '{plugin_id}' cannot {operation} from state {from}")]
    InvalidStateTransition {
        plugin_id: String,
        operation: Operation,
        from: PluginState,
    },

    /// Another lifecycle transition for the same instance is still in flight.
    #[error("plugin '{plugin_id}' already has a lifecycle operation in flight")]
    OperationInProgress { plugin_id: String },

    /// A privileged action was refused by the sandbox.
    #[error("permission denied for plugin '{plugin_id}': {reason}")]
    PermissionDenied { plugin_id: String, reason: String },

    /// No plugin with this id is registered.
    #[error("plugin not registered: {0}")]
    UnregisteredPlugin(String),

    /// A plugin with this id is already registered.
    #[error("plugin already registered: {0}")]
    DuplicateRegistration(String),

    /// The plugin type's instance limit would be exceeded.
    #[error("plugin type {plugin_type} allows at most {limit} instances")]
    TypeLimitExceeded {
        plugin_type: PluginType,
        limit: usize,
    },

    /// An execution context is already bound to a plugin.
    #[error("execution context already bound to plugin '{bound}', cannot bind '{requested}'")]
    BindingActive { bound: String, requested: String },

    /// Event delivery requires a running plugin.
    #[error("plugin '{plugin_id}' is not running (state {state})")]
    NotRunning { plugin_id: String, state: PluginState },

    /// The plugin's own unit of work failed.
    #[error("plugin '{plugin_id}' failed during {operation}: {message}")]
    PluginFailure {
        plugin_id: String,
        operation: Operation,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A plugin of a critical type failed; the host should treat this as fatal.
    #[error("critical plugin '{plugin_id}' ({plugin_type}) failed: {source}")]
    CriticalFailure {
        plugin_id: String,
        plugin_type: PluginType,
        #[source]
        source: Box<TesseraError>,
    },

    /// The host API version is outside the plugin's supported range.
    #[error("plugin '{plugin_id}' supports API {min}..={max}, host provides {host}")]
    IncompatibleApi {
        plugin_id: String,
        host: u32,
        min: u32,
        max: u32,
    },

    /// A declared dependency is not registered.
    #[error("plugin '{plugin_id}' depends on unregistered plugin '{dependency}'")]
    MissingDependency {
        plugin_id: String,
        dependency: String,
    },

    /// A declared dependency must be running before this plugin starts.
    #[error("plugin '{plugin_id}' requires '{dependency}' to be running")]
    DependencyNotRunning {
        plugin_id: String,
        dependency: String,
    },

    /// Other registered plugins still depend on this one.
    #[error("plugin '{plugin_id}' is required by: {}", dependents.join(", "))]
    HasDependents {
        plugin_id: String,
        dependents: Vec<String>,
    },

    /// The descriptor is malformed (empty id, bad version, inverted API range).
    #[error("invalid plugin descriptor: {0}")]
    InvalidDescriptor(String),

    /// A capability grant could not be compiled (bad path pattern).
    #[error("invalid capability grant for '{plugin_id}': {message}")]
    InvalidGrant { plugin_id: String, message: String },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Grant persistence errors.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TesseraError {
    /// Returns the innermost Tessera error, looking through plugin failure
    /// and critical-failure wrappers.
    pub fn root_cause(&self) -> &TesseraError {
        match self {
            TesseraError::CriticalFailure { source, .. } => source.root_cause(),
            TesseraError::PluginFailure {
                source: Some(source),
                ..
            } => match source.downcast_ref::<TesseraError>() {
                Some(inner) => inner.root_cause(),
                None => self,
            },
            _ => self,
        }
    }

    /// True if this error, or the error it wraps, is a sandbox denial.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.root_cause(), TesseraError::PermissionDenied { .. })
    }

    /// Convenience constructor for plugin authors reporting a failed unit of work.
    pub fn plugin(plugin_id: impl Into<String>, operation: Operation, message: impl Into<String>) -> Self {
        TesseraError::PluginFailure {
            plugin_id: plugin_id.into(),
            operation,
            message: message.into(),
            source: None,
        }
    }
}
