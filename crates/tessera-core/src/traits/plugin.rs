// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The plugin unit-of-work trait.

use async_trait::async_trait;

use crate::context::PluginContext;
use crate::error::TesseraError;
use crate::types::{ConfigMap, MetricsMap};

/// Plugin code driven by the lifecycle controller.
///
/// Each method runs on the host's worker pool with the plugin's identity bound
/// to the execution context behind `ctx`. Privileged actions must be checked
/// through `ctx` before they are performed.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Prepare internal resources from the initial configuration.
    async fn initialize(&self, ctx: &PluginContext, config: &ConfigMap) -> Result<(), TesseraError>;

    /// Begin serving.
    async fn start(&self, ctx: &PluginContext) -> Result<(), TesseraError>;

    /// Stop serving; the instance may be started again afterwards.
    async fn stop(&self, ctx: &PluginContext) -> Result<(), TesseraError>;

    /// Release every resource held by the instance.
    async fn destroy(&self, ctx: &PluginContext) -> Result<(), TesseraError>;

    /// Apply a replacement configuration.
    async fn configure(&self, _ctx: &PluginContext, _config: &ConfigMap) -> Result<(), TesseraError> {
        Ok(())
    }

    /// React to a host event while running.
    async fn handle_event(
        &self,
        _ctx: &PluginContext,
        _event_type: &str,
        _payload: &serde_json::Value,
    ) -> Result<(), TesseraError> {
        Ok(())
    }

    /// Plugin-reported metrics, merged into the host's snapshot after each call.
    fn metrics(&self) -> MetricsMap {
        MetricsMap::new()
    }
}
