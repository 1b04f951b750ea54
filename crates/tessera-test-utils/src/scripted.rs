// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted plugin for deterministic lifecycle testing.
//!
//! `ScriptedPlugin` implements `Plugin` with per-operation outcome queues.
//! When a queue is empty the call succeeds. Calls can be held open with a
//! [`HoldGate`] so tests can observe an in-flight transition.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tessera_core::{
    CapabilityRequest, ConfigMap, MetricsMap, Operation, Plugin, PluginContext, TesseraError,
};
use tokio::sync::Notify;

/// What one call into the plugin does.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed,
    Fail(String),
    Panic(String),
    /// Perform a capability check through the context; fail if denied.
    Check(CapabilityRequest),
}

/// Holds a call open until released.
#[derive(Debug, Default)]
pub struct HoldGate {
    entered: Notify,
    release: Notify,
}

impl HoldGate {
    /// Wait until the held call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
struct Script {
    outcomes: HashMap<Operation, VecDeque<Outcome>>,
    gates: HashMap<Operation, Arc<HoldGate>>,
    calls: Vec<Operation>,
    checks: Vec<(CapabilityRequest, bool)>,
    configs: Vec<ConfigMap>,
    events: Vec<(String, Value)>,
    metrics: MetricsMap,
    retained: Option<PluginContext>,
}

/// A plugin whose behavior is scripted per operation.
#[derive(Debug, Default)]
pub struct ScriptedPlugin {
    script: Mutex<Script>,
}

impl ScriptedPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next call of `operation`.
    pub fn with(self, operation: Operation, outcome: Outcome) -> Self {
        self.push(operation, outcome);
        self
    }

    pub fn push(&self, operation: Operation, outcome: Outcome) {
        self.lock()
            .outcomes
            .entry(operation)
            .or_default()
            .push_back(outcome);
    }

    /// Hold every call of `operation` until the returned gate is released.
    pub fn hold(&self, operation: Operation) -> Arc<HoldGate> {
        let gate = Arc::new(HoldGate::default());
        self.lock().gates.insert(operation, Arc::clone(&gate));
        gate
    }

    pub fn set_metric(&self, name: &str, value: Value) {
        self.lock().metrics.insert(name.to_string(), value);
    }

    /// Every operation invoked so far, in order.
    pub fn calls(&self) -> Vec<Operation> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.lock().calls.iter().filter(|op| **op == operation).count()
    }

    /// Capability checks performed and whether each was allowed.
    pub fn checks(&self) -> Vec<(CapabilityRequest, bool)> {
        self.lock().checks.clone()
    }

    /// Configurations received through initialize and configure.
    pub fn configs(&self) -> Vec<ConfigMap> {
        self.lock().configs.clone()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.lock().events.clone()
    }

    /// The context handed to the most recent call, kept past its lifetime.
    pub fn retained_context(&self) -> Option<PluginContext> {
        self.lock().retained.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run(&self, operation: Operation, ctx: &PluginContext) -> Result<(), TesseraError> {
        let gate = {
            let mut script = self.lock();
            script.calls.push(operation);
            script.retained = Some(ctx.clone());
            script.gates.get(&operation).cloned()
        };

        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let outcome = self
            .lock()
            .outcomes
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Outcome::Succeed);

        match outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail(message) => Err(TesseraError::plugin(ctx.plugin_id(), operation, message)),
            Outcome::Panic(message) => panic!("{message}"),
            Outcome::Check(request) => {
                let result = ctx.check(&request);
                self.lock().checks.push((request, result.is_ok()));
                result
            }
        }
    }
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    async fn initialize(&self, ctx: &PluginContext, config: &ConfigMap) -> Result<(), TesseraError> {
        self.lock().configs.push(config.clone());
        self.run(Operation::Initialize, ctx).await
    }

    async fn start(&self, ctx: &PluginContext) -> Result<(), TesseraError> {
        self.run(Operation::Start, ctx).await
    }

    async fn stop(&self, ctx: &PluginContext) -> Result<(), TesseraError> {
        self.run(Operation::Stop, ctx).await
    }

    async fn destroy(&self, ctx: &PluginContext) -> Result<(), TesseraError> {
        self.run(Operation::Destroy, ctx).await
    }

    async fn configure(&self, ctx: &PluginContext, config: &ConfigMap) -> Result<(), TesseraError> {
        self.lock().configs.push(config.clone());
        self.run(Operation::Configure, ctx).await
    }

    async fn handle_event(
        &self,
        ctx: &PluginContext,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), TesseraError> {
        self.lock()
            .events
            .push((event_type.to_string(), payload.clone()));
        self.run(Operation::HandleEvent, ctx).await
    }

    fn metrics(&self) -> MetricsMap {
        self.lock().metrics.clone()
    }
}
