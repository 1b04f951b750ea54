// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable plugin metadata supplied by discovery.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::TesseraError;
use crate::types::PluginType;

/// Metadata describing one plugin. Never mutated after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin identifier (e.g., "ocr-demo").
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Semantic version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Author identifier.
    pub author: String,
    /// Category from the plugin type taxonomy.
    pub plugin_type: PluginType,
    /// Lowest host API version the plugin supports.
    pub min_api_version: u32,
    /// Highest host API version the plugin supports.
    pub max_api_version: u32,
    /// Capabilities the plugin declares it needs.
    pub required_capabilities: BTreeSet<String>,
    /// Ids of plugins this plugin depends on.
    pub dependencies: BTreeSet<String>,
}

impl PluginDescriptor {
    /// Create a descriptor with placeholder metadata, API range 1..=1, and no
    /// dependencies.
    pub fn new(id: impl Into<String>, plugin_type: PluginType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: "0.1.0".to_string(),
            description: String::new(),
            author: String::new(),
            plugin_type,
            min_api_version: 1,
            max_api_version: 1,
            required_capabilities: BTreeSet::new(),
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    pub fn with_api_range(mut self, min: u32, max: u32) -> Self {
        self.min_api_version = min;
        self.max_api_version = max;
        self
    }

    /// Check structural validity: non-empty id, semver version, and an ordered
    /// API range.
    pub fn validate(&self) -> Result<(), TesseraError> {
        if self.id.trim().is_empty() {
            return Err(TesseraError::InvalidDescriptor(
                "id must not be empty".to_string(),
            ));
        }
        semver::Version::parse(&self.version).map_err(|e| {
            TesseraError::InvalidDescriptor(format!(
                "plugin '{}' has invalid version '{}': {e}",
                self.id, self.version
            ))
        })?;
        if self.min_api_version > self.max_api_version {
            return Err(TesseraError::InvalidDescriptor(format!(
                "plugin '{}' has min_api_version {} above max_api_version {}",
                self.id, self.min_api_version, self.max_api_version
            )));
        }
        if self.dependencies.contains(&self.id) {
            return Err(TesseraError::InvalidDescriptor(format!(
                "plugin '{}' lists itself as a dependency",
                self.id
            )));
        }
        Ok(())
    }

    /// Fail with `IncompatibleApi` unless `host_api` lies within the plugin's range.
    pub fn check_api(&self, host_api: u32) -> Result<(), TesseraError> {
        if (self.min_api_version..=self.max_api_version).contains(&host_api) {
            Ok(())
        } else {
            Err(TesseraError::IncompatibleApi {
                plugin_id: self.id.clone(),
                host: host_api,
                min: self.min_api_version,
                max: self.max_api_version,
            })
        }
    }
}
