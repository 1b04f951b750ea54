// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tessera plugin host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tessera_core::CapabilityGrant;

/// Top-level Tessera configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TesseraConfig {
    /// Host identity and API level.
    #[serde(default)]
    pub host: HostConfig,

    /// Capability sandbox settings.
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Lifecycle controller settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Per-type overrides of the built-in plugin type table, keyed by type
    /// name (e.g. `[types.SECURITY]`).
    #[serde(default)]
    pub types: BTreeMap<String, TypeOverride>,
}

/// Host identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Display name of the host application.
    #[serde(default = "default_host_name")]
    pub name: String,

    /// Plugin API version offered by the host. Plugins declaring a range that
    /// excludes it are refused at registration.
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: default_host_name(),
            api_version: default_api_version(),
            log_level: default_log_level(),
        }
    }
}

fn default_host_name() -> String {
    "tessera".to_string()
}

fn default_api_version() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Capability sandbox configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    /// When false every capability check is allowed. Intended for development only.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Baseline grant applied to bound plugins with no registered grant.
    /// `None` keeps the sandbox fail-closed.
    #[serde(default)]
    pub default_grant: Option<CapabilityGrant>,

    /// Path of the persisted grant store. `None` uses
    /// `<data_dir>/tessera/grants.toml`.
    #[serde(default)]
    pub grant_store: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_grant: None,
            grant_store: None,
        }
    }
}

impl SandboxConfig {
    /// Resolve the grant store location, falling back to the XDG data directory.
    pub fn grant_store_path(&self) -> Option<PathBuf> {
        match &self.grant_store {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::data_dir().map(|d| d.join("tessera").join("grants.toml")),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Lifecycle controller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    /// Capacity of the host event broadcast channel. Slow subscribers that fall
    /// further behind than this miss events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Calls into plugin code that take longer than this are counted as slow.
    #[serde(default = "default_slow_operation_ms")]
    pub slow_operation_ms: u64,

    /// An instance turns DEGRADED once its slow-call count exceeds this.
    #[serde(default = "default_max_slow_operations")]
    pub max_slow_operations: u64,

    /// An instance turns DEGRADED once this many calls have failed.
    #[serde(default = "default_max_errors")]
    pub max_errors: u64,

    /// Failure ratio above which an instance turns DEGRADED, applied once more
    /// than ten calls have been made.
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            slow_operation_ms: default_slow_operation_ms(),
            max_slow_operations: default_max_slow_operations(),
            max_errors: default_max_errors(),
            max_error_rate: default_max_error_rate(),
        }
    }
}

fn default_event_capacity() -> usize {
    256
}

fn default_slow_operation_ms() -> u64 {
    5_000
}

fn default_max_slow_operations() -> u64 {
    3
}

fn default_max_errors() -> u64 {
    5
}

fn default_max_error_rate() -> f64 {
    0.5
}

/// Override of one row of the built-in plugin type table.
///
/// Unset fields keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TypeOverride {
    /// Escalate unrecoverable failures of this type to the host as fatal.
    #[serde(default)]
    pub critical: Option<bool>,

    /// Require a registered capability grant before an instance may run.
    #[serde(default)]
    pub requires_grant: Option<bool>,

    /// Maximum concurrent instances; `-1` means unbounded.
    #[serde(default)]
    pub max_instances: Option<i64>,
}
