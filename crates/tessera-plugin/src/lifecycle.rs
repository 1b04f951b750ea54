// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-instance lifecycle state machine.
//!
//! Each registered plugin gets one [`PluginLifecycleController`]. Transitions
//! are serialized by a per-instance operation lock taken without waiting: a
//! second transition requested while one is in flight is rejected with
//! `OperationInProgress`, never queued. Accepted transitions move the instance
//! to the pending ("-ING") state immediately, then run the plugin's unit of
//! work on the runtime with the plugin's identity bound to a fresh
//! [`ExecutionContext`].
//!
//! | operation  | legal from             | success   | failure             |
//! |------------|------------------------|-----------|---------------------|
//! | initialize | UNLOADED               | INITIALIZED | UNLOADED          |
//! | start      | INITIALIZED, STOPPED   | RUNNING   | STOPPED             |
//! | stop       | RUNNING                | STOPPED   | STOPPED             |
//! | destroy    | INITIALIZED, STOPPED   | UNLOADED  | state before destroy |
//!
//! Every failure sets health to UNHEALTHY.
//!
//! Each call into plugin code is also timed. An instance that crosses its
//! [`PerformanceLimits`] is reported DEGRADED, and a later successful
//! initialize or start no longer resets it to HEALTHY.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::FutureExt;
use serde_json::Value;
use tessera_core::{
    ConfigMap, HealthStatus, MetricsMap, Operation, Plugin, PluginContext, PluginDescriptor,
    PluginState, TesseraError, Transition,
};
use tessera_security::{ExecutionContext, SandboxEnforcer};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::events::{EventSink, PluginEvent};
use crate::monitor::{ExecutionStats, PerformanceLimits};

/// Point-in-time view of one plugin instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSnapshot {
    pub state: PluginState,
    pub health: HealthStatus,
    pub configuration: ConfigMap,
    /// Metrics last reported by the plugin itself.
    pub plugin_metrics: MetricsMap,
}

impl Default for InstanceSnapshot {
    fn default() -> Self {
        Self {
            state: PluginState::Unloaded,
            health: HealthStatus::Unknown,
            configuration: ConfigMap::new(),
            plugin_metrics: MetricsMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    transitions: AtomicU64,
    failures: AtomicU64,
    events_handled: AtomicU64,
    events_failed: AtomicU64,
}

/// One call into plugin code.
enum Call<'a> {
    Initialize(&'a ConfigMap),
    Start,
    Stop,
    Destroy,
    Configure(&'a ConfigMap),
    Event(&'a str, &'a Value),
}

impl Call<'_> {
    fn operation(&self) -> Operation {
        match self {
            Call::Initialize(_) => Operation::Initialize,
            Call::Start => Operation::Start,
            Call::Stop => Operation::Stop,
            Call::Destroy => Operation::Destroy,
            Call::Configure(_) => Operation::Configure,
            Call::Event(..) => Operation::HandleEvent,
        }
    }
}

/// Drives one plugin instance through its lifecycle.
pub struct PluginLifecycleController {
    descriptor: Arc<PluginDescriptor>,
    plugin: Arc<dyn Plugin>,
    enforcer: Arc<SandboxEnforcer>,
    runtime: Handle,
    critical: bool,
    events: EventSink,
    snapshot: ArcSwap<InstanceSnapshot>,
    counters: Counters,
    limits: PerformanceLimits,
    stats: ExecutionStats,
    op_lock: Arc<Mutex<()>>,
    /// Set under the operation lock when the registry drops this instance.
    retired: AtomicBool,
}

impl PluginLifecycleController {
    /// Create a controller in state UNLOADED.
    ///
    /// Work units run on `runtime`. When `critical` is set, work-unit failures
    /// are escalated as `CriticalFailure` and broadcast as `PluginEvent::Fatal`.
    pub fn new(
        descriptor: PluginDescriptor,
        plugin: Arc<dyn Plugin>,
        enforcer: Arc<SandboxEnforcer>,
        runtime: Handle,
        critical: bool,
        events: EventSink,
    ) -> Arc<Self> {
        Self::with_limits(
            descriptor,
            plugin,
            enforcer,
            runtime,
            critical,
            events,
            PerformanceLimits::default(),
        )
    }

    /// Like [`new`](Self::new) with explicit execution thresholds.
    pub fn with_limits(
        descriptor: PluginDescriptor,
        plugin: Arc<dyn Plugin>,
        enforcer: Arc<SandboxEnforcer>,
        runtime: Handle,
        critical: bool,
        events: EventSink,
        limits: PerformanceLimits,
    ) -> Arc<Self> {
        Arc::new(Self {
            descriptor: Arc::new(descriptor),
            plugin,
            enforcer,
            runtime,
            critical,
            events,
            snapshot: ArcSwap::from_pointee(InstanceSnapshot::default()),
            counters: Counters::default(),
            limits,
            stats: ExecutionStats::default(),
            op_lock: Arc::new(Mutex::new(())),
            retired: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn limits(&self) -> &PerformanceLimits {
        &self.limits
    }

    pub fn state(&self) -> PluginState {
        self.snapshot.load().state
    }

    pub fn health(&self) -> HealthStatus {
        self.snapshot.load().health
    }

    pub fn configuration(&self) -> ConfigMap {
        self.snapshot.load().configuration.clone()
    }

    pub fn snapshot(&self) -> Arc<InstanceSnapshot> {
        self.snapshot.load_full()
    }

    /// Plugin-reported metrics merged with host-observed counters and
    /// execution timings (`exec.*`).
    pub fn metrics(&self) -> MetricsMap {
        let mut merged = self.snapshot.load().plugin_metrics.clone();
        let counters = [
            ("lifecycle.transitions", &self.counters.transitions),
            ("lifecycle.failures", &self.counters.failures),
            ("events.handled", &self.counters.events_handled),
            ("events.failed", &self.counters.events_failed),
        ];
        for (name, counter) in counters {
            merged.insert(name.to_string(), Value::from(counter.load(Ordering::Relaxed)));
        }
        self.stats.export(&mut merged);
        merged
    }

    /// Mark the instance as removed from its registry. Only legal in UNLOADED
    /// with no transition in flight; afterwards every request is refused with
    /// `UnregisteredPlugin`.
    pub(crate) fn retire(&self) -> Result<(), TesseraError> {
        let _guard = self
            .op_lock
            .try_lock()
            .map_err(|_| TesseraError::OperationInProgress {
                plugin_id: self.id().to_string(),
            })?;
        let state = self.state();
        if state != PluginState::Unloaded {
            return Err(TesseraError::InvalidStateTransition {
                plugin_id: self.id().to_string(),
                operation: Operation::Destroy,
                from: state,
            });
        }
        self.retired.store(true, Ordering::Release);
        Ok(())
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub fn initialize(self: &Arc<Self>, config: ConfigMap) -> PendingTransition {
        self.begin(Operation::Initialize, config)
    }

    pub fn start(self: &Arc<Self>) -> PendingTransition {
        self.begin(Operation::Start, ConfigMap::new())
    }

    pub fn stop(self: &Arc<Self>) -> PendingTransition {
        self.begin(Operation::Stop, ConfigMap::new())
    }

    pub fn destroy(self: &Arc<Self>) -> PendingTransition {
        self.begin(Operation::Destroy, ConfigMap::new())
    }

    /// Replace the configuration once any in-flight transition has finished,
    /// then notify the plugin. On failure the old configuration is kept and
    /// health drops to DEGRADED.
    pub fn update_configuration(self: &Arc<Self>, config: ConfigMap) -> PendingTransition {
        let this = Arc::clone(self);
        PendingTransition::spawned(self.runtime.spawn(async move {
            let _guard = Arc::clone(&this.op_lock).lock_owned().await;
            if this.is_retired() {
                return Err(TesseraError::UnregisteredPlugin(this.id().to_string()));
            }
            let state = this.state();
            if state == PluginState::Unloaded {
                return Err(TesseraError::InvalidStateTransition {
                    plugin_id: this.id().to_string(),
                    operation: Operation::Configure,
                    from: state,
                });
            }
            match this.invoke(Call::Configure(&config)).await {
                Ok(()) => {
                    this.update(|s| s.configuration = config.clone());
                    info!(plugin_id = %this.id(), keys = config.len(), "configuration updated");
                    Ok(())
                }
                Err(err) => {
                    this.update(|s| s.health = HealthStatus::Degraded);
                    Err(this.report_failure(Operation::Configure, err, false))
                }
            }
        }))
    }

    /// Deliver a host event. Legal only while RUNNING; does not take the
    /// operation lock. A failing handler marks the instance DEGRADED.
    pub fn handle_event(
        self: &Arc<Self>,
        event_type: impl Into<String>,
        payload: Value,
    ) -> PendingTransition {
        if self.is_retired() {
            return PendingTransition::rejected(TesseraError::UnregisteredPlugin(self.id().to_string()));
        }
        let state = self.state();
        if state != PluginState::Running {
            return PendingTransition::rejected(TesseraError::NotRunning {
                plugin_id: self.id().to_string(),
                state,
            });
        }
        let event_type = event_type.into();
        let this = Arc::clone(self);
        PendingTransition::spawned(self.runtime.spawn(async move {
            match this.invoke(Call::Event(&event_type, &payload)).await {
                Ok(()) => {
                    this.counters.events_handled.fetch_add(1, Ordering::Relaxed);
                    debug!(plugin_id = %this.id(), event_type = %event_type, "event handled");
                    Ok(())
                }
                Err(err) => {
                    this.counters.events_failed.fetch_add(1, Ordering::Relaxed);
                    this.update(|s| s.health = HealthStatus::Degraded);
                    Err(this.report_failure(Operation::HandleEvent, err, false))
                }
            }
        }))
    }

    fn begin(self: &Arc<Self>, operation: Operation, config: ConfigMap) -> PendingTransition {
        let guard = match Arc::clone(&self.op_lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(plugin_id = %self.id(), operation = %operation, "rejected: operation in progress");
                return PendingTransition::rejected(TesseraError::OperationInProgress {
                    plugin_id: self.id().to_string(),
                });
            }
        };
        if self.is_retired() {
            return PendingTransition::rejected(TesseraError::UnregisteredPlugin(self.id().to_string()));
        }

        let from = self.state();
        let Some(transition) = operation.transition_from(from) else {
            debug!(plugin_id = %self.id(), operation = %operation, state = %from, "rejected: illegal transition");
            return PendingTransition::rejected(TesseraError::InvalidStateTransition {
                plugin_id: self.id().to_string(),
                operation,
                from,
            });
        };

        self.commit(transition.pending, |_| {});

        let this = Arc::clone(self);
        PendingTransition::spawned(self.runtime.spawn(async move {
            let result = this.run_transition(operation, transition, config).await;
            drop(guard);
            result
        }))
    }

    async fn run_transition(
        &self,
        operation: Operation,
        transition: Transition,
        config: ConfigMap,
    ) -> Result<(), TesseraError> {
        let call = match operation {
            Operation::Initialize => Call::Initialize(&config),
            Operation::Start => Call::Start,
            Operation::Stop => Call::Stop,
            _ => Call::Destroy,
        };
        self.counters.transitions.fetch_add(1, Ordering::Relaxed);

        match self.invoke(call).await {
            Ok(()) => {
                self.commit(transition.target, |s| {
                    if operation == Operation::Initialize {
                        s.configuration = config.clone();
                    }
                    if matches!(operation, Operation::Initialize | Operation::Start) {
                        s.health = if self.stats.is_degraded() {
                            HealthStatus::Degraded
                        } else {
                            HealthStatus::Healthy
                        };
                    }
                });
                info!(
                    plugin_id = %self.id(),
                    operation = %operation,
                    state = %transition.target,
                    "lifecycle transition complete"
                );
                Ok(())
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                self.commit(transition.on_failure, |s| s.health = HealthStatus::Unhealthy);
                Err(self.report_failure(operation, err, self.critical))
            }
        }
    }

    /// Run one call into plugin code under a fresh binding.
    async fn invoke(&self, call: Call<'_>) -> Result<(), TesseraError> {
        let operation = call.operation();
        let context = ExecutionContext::new();
        let binding = self.enforcer.bind(&context, self.id())?;
        let ctx = PluginContext::new(self.id(), self.enforcer.gate(Arc::clone(&context), self.id()));

        let plugin = Arc::clone(&self.plugin);
        let work = async move {
            match call {
                Call::Initialize(config) => plugin.initialize(&ctx, config).await,
                Call::Start => plugin.start(&ctx).await,
                Call::Stop => plugin.stop(&ctx).await,
                Call::Destroy => plugin.destroy(&ctx).await,
                Call::Configure(config) => plugin.configure(&ctx, config).await,
                Call::Event(event_type, payload) => plugin.handle_event(&ctx, event_type, payload).await,
            }
        };
        let started = Instant::now();
        let outcome = AssertUnwindSafe(work).catch_unwind().await;
        let elapsed = started.elapsed();
        binding.unbind();
        self.refresh_metrics();
        self.observe(operation, elapsed, matches!(outcome, Ok(Ok(()))));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err @ TesseraError::PluginFailure { .. })) => Err(err),
            Ok(Err(err)) => Err(TesseraError::PluginFailure {
                plugin_id: self.id().to_string(),
                operation,
                message: err.to_string(),
                source: Some(Box::new(err)),
            }),
            Err(panic) => Err(TesseraError::PluginFailure {
                plugin_id: self.id().to_string(),
                operation,
                message: format!("panicked: {}", panic_message(panic.as_ref())),
                source: None,
            }),
        }
    }

    fn report_failure(&self, operation: Operation, err: TesseraError, critical: bool) -> TesseraError {
        let message = err.to_string();
        self.events.emit(PluginEvent::Failed {
            plugin_id: self.id().to_string(),
            operation,
            message: message.clone(),
        });

        if !critical {
            warn!(plugin_id = %self.id(), operation = %operation, error = %message, "plugin operation failed");
            return err;
        }

        error!(
            plugin_id = %self.id(),
            plugin_type = %self.descriptor.plugin_type,
            operation = %operation,
            error = %message,
            "critical plugin failed"
        );
        self.events.emit(PluginEvent::Fatal {
            plugin_id: self.id().to_string(),
            plugin_type: self.descriptor.plugin_type,
            message,
        });
        TesseraError::CriticalFailure {
            plugin_id: self.id().to_string(),
            plugin_type: self.descriptor.plugin_type,
            source: Box::new(err),
        }
    }

    fn observe(&self, operation: Operation, elapsed: Duration, succeeded: bool) {
        let recorded = self.stats.record(elapsed, succeeded, &self.limits);
        if recorded.slow {
            warn!(
                plugin_id = %self.id(),
                operation = %operation,
                elapsed_ms = recorded.elapsed_ms,
                "slow plugin operation"
            );
        }
        if let Some(reason) = recorded.degraded {
            self.update(|s| {
                if s.health != HealthStatus::Unhealthy {
                    s.health = HealthStatus::Degraded;
                }
            });
            warn!(plugin_id = %self.id(), reason, "plugin degraded");
        }
    }

    fn refresh_metrics(&self) {
        let reported = self.plugin.metrics();
        self.update(|s| s.plugin_metrics = reported.clone());
    }

    /// Publish a new state (plus any other snapshot edits) and announce it.
    fn commit(&self, to: PluginState, mut edit: impl FnMut(&mut InstanceSnapshot)) {
        let previous = self.update(|s| {
            s.state = to;
            edit(s);
        });
        if previous.state != to {
            debug!(plugin_id = %self.id(), from = %previous.state, to = %to, "state changed");
            self.events.emit(PluginEvent::StateChanged {
                plugin_id: self.id().to_string(),
                from: previous.state,
                to,
            });
        }
    }

    fn update(&self, mut edit: impl FnMut(&mut InstanceSnapshot)) -> Arc<InstanceSnapshot> {
        self.snapshot.rcu(|current| {
            let mut next = InstanceSnapshot::clone(current);
            edit(&mut next);
            next
        })
    }
}

impl std::fmt::Debug for PluginLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("PluginLifecycleController")
            .field("id", &self.descriptor.id)
            .field("plugin_type", &self.descriptor.plugin_type)
            .field("state", &snapshot.state)
            .field("health", &snapshot.health)
            .field("critical", &self.critical)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Completion of a lifecycle request.
///
/// Rejected requests resolve immediately with their error. Accepted requests
/// resolve when the unit of work has finished and its outcome is committed.
/// Dropping the future does not cancel the work.
#[must_use = "lifecycle requests report their outcome through this future"]
pub struct PendingTransition {
    inner: Pending,
}

enum Pending {
    Done(Option<Result<(), TesseraError>>),
    Running(JoinHandle<Result<(), TesseraError>>),
}

impl PendingTransition {
    pub(crate) fn rejected(err: TesseraError) -> Self {
        Self {
            inner: Pending::Done(Some(Err(err))),
        }
    }

    fn spawned(handle: JoinHandle<Result<(), TesseraError>>) -> Self {
        Self {
            inner: Pending::Running(handle),
        }
    }

    /// Whether the request was refused without starting any work.
    pub fn is_rejected(&self) -> bool {
        matches!(self.inner, Pending::Done(Some(Err(_))))
    }
}

impl Future for PendingTransition {
    type Output = Result<(), TesseraError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Pending::Done(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(TesseraError::Internal(
                    "lifecycle result polled after completion".to_string(),
                ))
            })),
            Pending::Running(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(TesseraError::Internal(format!("lifecycle task failed: {e}")))
                })
            }),
        }
    }
}

impl std::fmt::Debug for PendingTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match &self.inner {
            Pending::Done(_) => "done",
            Pending::Running(_) => "running",
        };
        f.debug_struct("PendingTransition").field("status", &status).finish()
    }
}
