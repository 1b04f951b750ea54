// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in plugin type table.
//!
//! Each of the 15 plugin categories carries a policy: whether failures are
//! fatal to the host, whether a capability grant is required before start,
//! and how many instances may exist at once. The built-in table can be
//! overridden per type from `[types.<NAME>]` configuration sections.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tessera_config::TypeOverride;
use tessera_core::{PluginType, TesseraError};

/// Maximum number of concurrent instances of one plugin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum InstanceLimit {
    Unbounded,
    AtMost(usize),
}

impl InstanceLimit {
    /// Whether one more instance fits when `current` already exist.
    pub fn admits(self, current: usize) -> bool {
        match self {
            InstanceLimit::Unbounded => true,
            InstanceLimit::AtMost(max) => current < max,
        }
    }

    pub fn as_usize(self) -> Option<usize> {
        match self {
            InstanceLimit::Unbounded => None,
            InstanceLimit::AtMost(max) => Some(max),
        }
    }
}

impl TryFrom<i64> for InstanceLimit {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(InstanceLimit::Unbounded),
            n if n >= 1 => usize::try_from(n)
                .map(InstanceLimit::AtMost)
                .map_err(|e| format!("instance limit {n} out of range: {e}")),
            n => Err(format!("instance limit must be -1 or positive, got {n}")),
        }
    }
}

impl From<InstanceLimit> for i64 {
    fn from(limit: InstanceLimit) -> Self {
        match limit {
            InstanceLimit::Unbounded => -1,
            InstanceLimit::AtMost(max) => i64::try_from(max).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for InstanceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceLimit::Unbounded => write!(f, "unbounded"),
            InstanceLimit::AtMost(max) => write!(f, "{max}"),
        }
    }
}

/// Policy attached to one plugin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePolicy {
    pub critical: bool,
    pub requires_grant: bool,
    pub max_instances: InstanceLimit,
}

impl TypePolicy {
    /// The compiled-in policy for `plugin_type`.
    pub fn builtin(plugin_type: PluginType) -> Self {
        use PluginType::*;
        let critical = matches!(plugin_type, Security | Database | FormatHandler);
        let requires_grant = matches!(
            plugin_type,
            Security | Database | Network | Integration | Automation
        );
        let max_instances = match plugin_type {
            Security => InstanceLimit::AtMost(5),
            Database => InstanceLimit::AtMost(3),
            _ => InstanceLimit::Unbounded,
        };
        Self {
            critical,
            requires_grant,
            max_instances,
        }
    }

    fn apply(&mut self, row: &TypeOverride) -> Result<(), String> {
        if let Some(critical) = row.critical {
            self.critical = critical;
        }
        if let Some(requires_grant) = row.requires_grant {
            self.requires_grant = requires_grant;
        }
        if let Some(limit) = row.max_instances {
            self.max_instances = InstanceLimit::try_from(limit)?;
        }
        Ok(())
    }
}

/// The effective type table consulted by the plugin registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginTypeRegistry {
    policies: BTreeMap<PluginType, TypePolicy>,
}

impl Default for PluginTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PluginTypeRegistry {
    /// The built-in table with no overrides.
    pub fn builtin() -> Self {
        Self {
            policies: PluginType::iter()
                .map(|t| (t, TypePolicy::builtin(t)))
                .collect(),
        }
    }

    /// The built-in table with configuration overrides applied.
    pub fn with_overrides(overrides: &BTreeMap<String, TypeOverride>) -> Result<Self, TesseraError> {
        let mut table = Self::builtin();
        for (name, row) in overrides {
            let plugin_type = PluginType::from_str(name)
                .map_err(|_| TesseraError::Config(format!("unknown plugin type '{name}'")))?;
            if let Some(policy) = table.policies.get_mut(&plugin_type) {
                policy
                    .apply(row)
                    .map_err(|e| TesseraError::Config(format!("types.{name}: {e}")))?;
            }
        }
        Ok(table)
    }

    pub fn policy(&self, plugin_type: PluginType) -> TypePolicy {
        self.policies
            .get(&plugin_type)
            .copied()
            .unwrap_or_else(|| TypePolicy::builtin(plugin_type))
    }

    pub fn is_critical(&self, plugin_type: PluginType) -> bool {
        self.policy(plugin_type).critical
    }

    pub fn requires_grant(&self, plugin_type: PluginType) -> bool {
        self.policy(plugin_type).requires_grant
    }

    pub fn max_instances(&self, plugin_type: PluginType) -> InstanceLimit {
        self.policy(plugin_type).max_instances
    }

    /// Every type with its effective policy, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (PluginType, TypePolicy)> + '_ {
        self.policies.iter().map(|(t, p)| (*t, *p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_all_fifteen_types() {
        assert_eq!(PluginTypeRegistry::builtin().iter().count(), 15);
    }

    #[test]
    fn builtin_critical_types() {
        let table = PluginTypeRegistry::builtin();
        let critical: Vec<PluginType> = table
            .iter()
            .filter(|(_, p)| p.critical)
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            critical,
            vec![PluginType::FormatHandler, PluginType::Security, PluginType::Database]
        );
    }

    #[test]
    fn builtin_grant_requirements() {
        let table = PluginTypeRegistry::builtin();
        for t in [
            PluginType::Security,
            PluginType::Database,
            PluginType::Network,
            PluginType::Integration,
            PluginType::Automation,
        ] {
            assert!(table.requires_grant(t), "{t}");
        }
        assert!(!table.requires_grant(PluginType::Ocr));
        assert!(!table.requires_grant(PluginType::Theme));
    }

    #[test]
    fn builtin_limits() {
        let table = PluginTypeRegistry::builtin();
        assert_eq!(table.max_instances(PluginType::Security), InstanceLimit::AtMost(5));
        assert_eq!(table.max_instances(PluginType::Database), InstanceLimit::AtMost(3));
        assert_eq!(table.max_instances(PluginType::Ocr), InstanceLimit::Unbounded);
    }

    #[test]
    fn overrides_replace_only_set_fields() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "security".to_string(),
            TypeOverride {
                critical: None,
                requires_grant: Some(false),
                max_instances: Some(-1),
            },
        );
        let table = PluginTypeRegistry::with_overrides(&overrides).unwrap();
        let policy = table.policy(PluginType::Security);
        assert!(policy.critical);
        assert!(!policy.requires_grant);
        assert_eq!(policy.max_instances, InstanceLimit::Unbounded);
    }

    #[test]
    fn unknown_override_type_is_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("WIDGET".to_string(), TypeOverride::default());
        assert!(PluginTypeRegistry::with_overrides(&overrides).is_err());
    }

    #[test]
    fn instance_limit_conversions() {
        assert_eq!(InstanceLimit::try_from(-1).unwrap(), InstanceLimit::Unbounded);
        assert_eq!(InstanceLimit::try_from(4).unwrap(), InstanceLimit::AtMost(4));
        assert!(InstanceLimit::try_from(0).is_err());
        assert!(InstanceLimit::try_from(-7).is_err());
        assert_eq!(i64::from(InstanceLimit::Unbounded), -1);
        assert!(InstanceLimit::AtMost(2).admits(1));
        assert!(!InstanceLimit::AtMost(2).admits(2));
        assert_eq!(InstanceLimit::Unbounded.to_string(), "unbounded");
    }
}
