// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tessera validate` command implementation.
//!
//! Parses a `plugin.toml`, checks its API range against `host.api_version`,
//! and reports the type policy that would apply to it.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use tessera_config::TesseraConfig;
use tessera_core::{PluginDescriptor, TesseraError};
use tessera_plugin::{PluginTypeRegistry, parse_plugin_descriptor};

use crate::Output;

/// Outcome of validating one manifest.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub descriptor: PluginDescriptor,
    pub host_api_version: u32,
    pub critical: bool,
    pub requires_grant: bool,
}

/// Validate manifest `content` against `config`.
pub fn validate_manifest(config: &TesseraConfig, content: &str) -> Result<ValidationReport, TesseraError> {
    let descriptor = parse_plugin_descriptor(content)?;
    descriptor.check_api(config.host.api_version)?;
    let policy = PluginTypeRegistry::with_overrides(&config.types)?.policy(descriptor.plugin_type);
    Ok(ValidationReport {
        descriptor,
        host_api_version: config.host.api_version,
        critical: policy.critical,
        requires_grant: policy.requires_grant,
    })
}

/// Run `tessera validate <plugin.toml>`.
pub fn run_validate(config: &TesseraConfig, manifest: &Path, output: Output) -> Result<(), TesseraError> {
    let content = std::fs::read_to_string(manifest).map_err(|e| {
        TesseraError::InvalidDescriptor(format!("cannot read {}: {e}", manifest.display()))
    })?;
    let report = validate_manifest(config, &content)?;

    if output.json {
        let body = serde_json::to_string_pretty(&report)
            .map_err(|e| TesseraError::Internal(format!("failed to serialize output: {e}")))?;
        println!("{body}");
        return Ok(());
    }

    let d = &report.descriptor;
    let ok = if output.color {
        "[OK]".green().to_string()
    } else {
        "[OK]".to_string()
    };
    println!("{ok} {} {} ({})", d.id, d.version, d.plugin_type);
    println!(
        "     api {}..={} (host {})",
        d.min_api_version, d.max_api_version, report.host_api_version
    );
    if !d.dependencies.is_empty() {
        let deps: Vec<&str> = d.dependencies.iter().map(String::as_str).collect();
        println!("     depends on {}", deps.join(", "));
    }
    if report.critical {
        println!("     critical type: failures are fatal to the host");
    }
    if report.requires_grant {
        println!("     needs a capability grant before start");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::PluginType;

    const OCR: &str = r#"
[plugin]
id = "ocr-demo"
version = "0.3.1"
type = "OCR"

[plugin.api]
min = 1
max = 2
"#;

    #[test]
    fn compatible_manifest_passes() {
        let report = validate_manifest(&TesseraConfig::default(), OCR).unwrap();
        assert_eq!(report.descriptor.plugin_type, PluginType::Ocr);
        assert!(!report.critical);
        assert!(!report.requires_grant);
    }

    #[test]
    fn incompatible_host_api_fails() {
        let mut config = TesseraConfig::default();
        config.host.api_version = 3;
        let err = validate_manifest(&config, OCR).unwrap_err();
        assert!(matches!(err, TesseraError::IncompatibleApi { host: 3, .. }));
    }

    #[test]
    fn unknown_type_fails() {
        let manifest = OCR.replace("\"OCR\"", "\"SPREADSHEET\"");
        assert!(matches!(
            validate_manifest(&TesseraConfig::default(), &manifest),
            Err(TesseraError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let output = Output {
            json: false,
            color: false,
        };
        let err = run_validate(&TesseraConfig::default(), Path::new("/nonexistent/plugin.toml"), output)
            .unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
