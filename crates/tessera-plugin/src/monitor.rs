// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution timing for calls into plugin code.
//!
//! Every work unit the lifecycle controller runs is timed and counted. Once an
//! instance crosses one of its [`PerformanceLimits`] it is latched as degraded
//! for the rest of its life in the registry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tessera_config::LifecycleConfig;
use tessera_core::MetricsMap;

/// The error-rate rule only applies after more calls than this.
const ERROR_RATE_MIN_CALLS: u64 = 10;

/// Thresholds past which an instance is reported DEGRADED.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceLimits {
    /// Calls taking longer than this count as slow.
    pub slow_operation: Duration,
    /// Degrade once the slow-call count exceeds this.
    pub max_slow_operations: u64,
    /// Degrade once this many calls have failed.
    pub max_errors: u64,
    /// Degrade once the failure ratio exceeds this (after ten calls).
    pub max_error_rate: f64,
}

impl Default for PerformanceLimits {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for PerformanceLimits {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            slow_operation: Duration::from_millis(config.slow_operation_ms),
            max_slow_operations: config.max_slow_operations,
            max_errors: config.max_errors,
            max_error_rate: config.max_error_rate,
        }
    }
}

/// Outcome of recording one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Recorded {
    pub slow: bool,
    pub elapsed_ms: u64,
    /// Set only on the call that first crossed a limit.
    pub degraded: Option<&'static str>,
}

#[derive(Debug, Default)]
pub(crate) struct ExecutionStats {
    success: AtomicU64,
    error: AtomicU64,
    total_ms: AtomicU64,
    max_ms: AtomicU64,
    slow: AtomicU64,
    degraded: AtomicBool,
}

impl ExecutionStats {
    pub fn record(&self, elapsed: Duration, succeeded: bool, limits: &PerformanceLimits) -> Recorded {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.total_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.max_ms.fetch_max(elapsed_ms, Ordering::Relaxed);

        let (success, error) = if succeeded {
            (self.success.fetch_add(1, Ordering::Relaxed) + 1, self.error.load(Ordering::Relaxed))
        } else {
            (self.success.load(Ordering::Relaxed), self.error.fetch_add(1, Ordering::Relaxed) + 1)
        };

        let slow = elapsed > limits.slow_operation;
        let slow_count = if slow {
            self.slow.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            self.slow.load(Ordering::Relaxed)
        };

        let calls = success + error;
        let reason = if slow_count > limits.max_slow_operations {
            Some("too many slow operations")
        } else if error >= limits.max_errors {
            Some("error count limit reached")
        } else if calls > ERROR_RATE_MIN_CALLS && error as f64 / calls as f64 > limits.max_error_rate {
            Some("error rate above limit")
        } else {
            None
        };

        let degraded = reason.filter(|_| !self.degraded.swap(true, Ordering::AcqRel));
        Recorded {
            slow,
            elapsed_ms,
            degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn export(&self, into: &mut MetricsMap) {
        let success = self.success.load(Ordering::Relaxed);
        let error = self.error.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);
        let calls = success + error;
        let avg_ms = if calls == 0 { 0 } else { total_ms / calls };

        let values = [
            ("exec.success", success),
            ("exec.error", error),
            ("exec.total_ms", total_ms),
            ("exec.avg_ms", avg_ms),
            ("exec.max_ms", self.max_ms.load(Ordering::Relaxed)),
            ("exec.slow", self.slow.load(Ordering::Relaxed)),
        ];
        for (name, value) in values {
            into.insert(name.to_string(), Value::from(value));
        }
    }
}
