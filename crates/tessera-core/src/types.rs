// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the registry, the lifecycle controller, and the sandbox.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Opaque plugin configuration, keyed by setting name.
pub type ConfigMap = BTreeMap<String, serde_json::Value>;

/// Metrics snapshot, keyed by metric name.
pub type MetricsMap = BTreeMap<String, serde_json::Value>;

/// Lifecycle state of a plugin instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    Unloaded,
    Initializing,
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
    Unloading,
}

impl PluginState {
    /// Whether `next` is reachable from `self` in one step of the lifecycle.
    ///
    /// Failure edges taken when a unit of work fails are described by
    /// [`Transition::on_failure`] and are not part of this table.
    pub fn can_transition_to(self, next: PluginState) -> bool {
        use PluginState::*;
        matches!(
            (self, next),
            (Unloaded, Initializing)
                | (Initializing, Initialized)
                | (Initialized | Stopped, Starting)
                | (Starting, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Initialized | Stopped, Unloading)
                | (Unloading, Unloaded)
        )
    }

    /// States in which a unit of work is executing.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            PluginState::Initializing
                | PluginState::Starting
                | PluginState::Stopping
                | PluginState::Unloading
        )
    }

    /// States that count towards a type's concurrent-instance limit at start time.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            PluginState::Starting | PluginState::Running | PluginState::Stopping
        )
    }
}

/// Health of a plugin instance as observed by the host.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

/// Operations a host can request on a plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Initialize,
    Start,
    Stop,
    Destroy,
    Configure,
    HandleEvent,
}

/// The states a lifecycle operation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State observed when the operation was accepted.
    pub from: PluginState,
    /// State held while the unit of work runs.
    pub pending: PluginState,
    /// State committed when the unit of work succeeds.
    pub target: PluginState,
    /// State committed when the unit of work fails.
    pub on_failure: PluginState,
}

impl Operation {
    /// Resolve the transition this operation performs from `from`.
    ///
    /// Returns `None` when the operation is not legal from `from`, or when the
    /// operation is not a lifecycle transition at all.
    pub fn transition_from(self, from: PluginState) -> Option<Transition> {
        use PluginState::*;
        let (pending, target, on_failure) = match (self, from) {
            (Operation::Initialize, Unloaded) => (Initializing, Initialized, Unloaded),
            (Operation::Start, Initialized | Stopped) => (Starting, Running, Stopped),
            (Operation::Stop, Running) => (Stopping, Stopped, Stopped),
            (Operation::Destroy, Initialized | Stopped) => (Unloading, Unloaded, from),
            _ => return None,
        };
        Some(Transition {
            from,
            pending,
            target,
            on_failure,
        })
    }
}

/// Plugin categories known to the host.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginType {
    Ocr,
    Translator,
    FormatHandler,
    UiExtension,
    Theme,
    Integration,
    ContentProcessor,
    Exporter,
    Analytics,
    Security,
    Automation,
    Database,
    Network,
    Multimedia,
    Utility,
}
