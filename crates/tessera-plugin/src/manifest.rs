// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin descriptor parsing from `plugin.toml` files.
//!
//! Discovery hands the host a `plugin.toml` per plugin; this module turns it
//! into a validated [`PluginDescriptor`].
//!
//! ```toml
//! [plugin]
//! id = "ocr-demo"
//! name = "OCR Demo"
//! version = "0.3.1"
//! description = "Recognizes text in scanned pages"
//! author = "Example Labs"
//! type = "OCR"
//! capabilities = ["file.read"]
//! dependencies = ["image-decoder"]
//!
//! [plugin.api]
//! min = 1
//! max = 2
//! ```

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::Deserialize;
use strum::IntoEnumIterator;
use tessera_core::{PluginDescriptor, PluginType, TesseraError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PluginManifestFile {
    plugin: PluginSection,
}

/// The `[plugin]` section of a `plugin.toml` file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PluginSection {
    id: String,
    name: Option<String>,
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(rename = "type")]
    plugin_type: String,
    #[serde(default)]
    api: ApiRange,
    #[serde(default)]
    capabilities: BTreeSet<String>,
    #[serde(default)]
    dependencies: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApiRange {
    min: u32,
    max: u32,
}

impl Default for ApiRange {
    fn default() -> Self {
        Self { min: 1, max: 1 }
    }
}

/// Parse and validate a plugin descriptor from TOML content.
///
/// The type name is matched case-insensitively. The result has passed
/// [`PluginDescriptor::validate`].
pub fn parse_plugin_descriptor(toml_content: &str) -> Result<PluginDescriptor, TesseraError> {
    let file: PluginManifestFile = toml::from_str(toml_content)
        .map_err(|e| TesseraError::InvalidDescriptor(format!("invalid plugin manifest: {e}")))?;

    let section = file.plugin;

    let plugin_type = PluginType::from_str(&section.plugin_type).map_err(|_| {
        let valid: Vec<String> = PluginType::iter().map(|t| t.to_string()).collect();
        TesseraError::InvalidDescriptor(format!(
            "invalid plugin type '{}'. Expected one of: {}",
            section.plugin_type,
            valid.join(", ")
        ))
    })?;

    let descriptor = PluginDescriptor {
        name: section.name.unwrap_or_else(|| section.id.clone()),
        id: section.id,
        version: section.version,
        description: section.description,
        author: section.author,
        plugin_type,
        min_api_version: section.api.min,
        max_api_version: section.api.max,
        required_capabilities: section.capabilities,
        dependencies: section.dependencies,
    };
    descriptor.validate()?;
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let toml = r#"
[plugin]
id = "ocr-demo"
name = "OCR Demo"
version = "0.3.1"
description = "Recognizes text in scanned pages"
author = "Example Labs"
type = "OCR"
capabilities = ["file.read", "ocr.recognize"]
dependencies = ["image-decoder"]

[plugin.api]
min = 1
max = 2
"#;
        let descriptor = parse_plugin_descriptor(toml).unwrap();
        assert_eq!(descriptor.id, "ocr-demo");
        assert_eq!(descriptor.name, "OCR Demo");
        assert_eq!(descriptor.plugin_type, PluginType::Ocr);
        assert_eq!(descriptor.min_api_version, 1);
        assert_eq!(descriptor.max_api_version, 2);
        assert!(descriptor.required_capabilities.contains("ocr.recognize"));
        assert!(descriptor.dependencies.contains("image-decoder"));
    }

    #[test]
    fn parse_minimal_manifest_uses_defaults() {
        let toml = r#"
[plugin]
id = "minimal"
version = "1.0.0"
type = "utility"
"#;
        let descriptor = parse_plugin_descriptor(toml).unwrap();
        assert_eq!(descriptor.name, "minimal");
        assert_eq!(descriptor.plugin_type, PluginType::Utility);
        assert_eq!((descriptor.min_api_version, descriptor.max_api_version), (1, 1));
        assert!(descriptor.dependencies.is_empty());
    }

    #[test]
    fn parse_invalid_type() {
        let toml = r#"
[plugin]
id = "bad"
version = "0.1.0"
type = "WIDGET"
"#;
        let err = parse_plugin_descriptor(toml).unwrap_err().to_string();
        assert!(err.contains("invalid plugin type 'WIDGET'"));
        assert!(err.contains("FORMAT_HANDLER"));
    }

    #[test]
    fn parse_rejects_bad_semver() {
        let toml = r#"
[plugin]
id = "bad"
version = "one"
type = "THEME"
"#;
        assert!(matches!(
            parse_plugin_descriptor(toml),
            Err(TesseraError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn parse_rejects_inverted_api_range() {
        let toml = r#"
[plugin]
id = "bad"
version = "0.1.0"
type = "THEME"

[plugin.api]
min = 3
max = 2
"#;
        assert!(parse_plugin_descriptor(toml).is_err());
    }

    #[test]
    fn parse_rejects_unknown_key() {
        let toml = r#"
[plugin]
id = "bad"
version = "0.1.0"
type = "THEME"
adapter_type = "Channel"
"#;
        let err = parse_plugin_descriptor(toml).unwrap_err().to_string();
        assert!(err.contains("adapter_type"));
    }
}
