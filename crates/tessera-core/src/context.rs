// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context handed to plugin code for the duration of one unit of work.

use std::fmt;
use std::sync::Arc;

use crate::capability::CapabilityRequest;
use crate::error::TesseraError;
use crate::traits::CapabilityGate;

/// Identity plus sandbox access for a running unit of work.
///
/// Cheap to clone. The gate stays tied to the execution binding it was created
/// for: once the binding is released, every check through this context denies.
#[derive(Clone)]
pub struct PluginContext {
    plugin_id: Arc<str>,
    gate: Arc<dyn CapabilityGate>,
}

impl PluginContext {
    pub fn new(plugin_id: impl Into<Arc<str>>, gate: Arc<dyn CapabilityGate>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            gate,
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Check an arbitrary request.
    pub fn check(&self, request: &CapabilityRequest) -> Result<(), TesseraError> {
        self.gate.check(request)
    }

    pub fn check_permission(&self, name: &str) -> Result<(), TesseraError> {
        self.check(&CapabilityRequest::Permission(name.to_string()))
    }

    pub fn check_file_read(&self, path: &str) -> Result<(), TesseraError> {
        self.check(&CapabilityRequest::FileRead(path.to_string()))
    }

    pub fn check_file_write(&self, path: &str) -> Result<(), TesseraError> {
        self.check(&CapabilityRequest::FileWrite(path.to_string()))
    }

    pub fn check_connect(&self, host: &str, port: u16) -> Result<(), TesseraError> {
        self.check(&CapabilityRequest::Connect {
            host: host.to_string(),
            port,
        })
    }

    pub fn check_exec(&self, command: &str) -> Result<(), TesseraError> {
        self.check(&CapabilityRequest::Exec(command.to_string()))
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.plugin_id)
            .finish_non_exhaustive()
    }
}
