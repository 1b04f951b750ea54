// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tessera grants` command implementation.
//!
//! Reads and writes the TOML grant store named by `sandbox.grant_store`
//! (default: `$XDG_DATA_HOME/tessera/grants.toml`). Writes go through a
//! [`CapabilityRegistry`] so patterns are compiled before they are persisted.

use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tessera_config::TesseraConfig;
use tessera_core::{CapabilityGrant, TesseraError};
use tessera_security::{CapabilityRegistry, GrantRecord, TomlGrantStore};
use tracing::info;

use crate::Output;

/// One grant in `--json` output.
#[derive(Debug, Serialize)]
pub struct GrantEntry {
    pub plugin_id: String,
    pub granted_at: String,
    pub grant: CapabilityGrant,
}

/// Open the grant store configured for this host.
pub(crate) fn open_store(config: &TesseraConfig) -> Result<Arc<TomlGrantStore>, TesseraError> {
    let path = config.sandbox.grant_store_path().ok_or_else(|| {
        TesseraError::Config(
            "cannot determine a data directory; set sandbox.grant_store".to_string(),
        )
    })?;
    Ok(Arc::new(TomlGrantStore::open(path)))
}

/// A capability registry loaded from, and writing through to, `store`.
pub(crate) fn open_registry(store: Arc<TomlGrantStore>) -> Result<Arc<CapabilityRegistry>, TesseraError> {
    Ok(Arc::new(CapabilityRegistry::with_store(store)?))
}

/// Assemble a grant from command-line flags.
pub fn build_grant(
    permissions: Vec<String>,
    read: Vec<String>,
    write: Vec<String>,
    network: bool,
    exec: bool,
) -> CapabilityGrant {
    CapabilityGrant {
        permissions: permissions.into_iter().collect(),
        file_read: read,
        file_write: write,
        network,
        exec,
    }
}

/// One-line summary of a grant, e.g. `perm[ocr.recognize] read[/data/**] net`.
pub fn summarize(grant: &CapabilityGrant) -> String {
    let mut parts = Vec::new();
    if !grant.permissions.is_empty() {
        let names: Vec<&str> = grant.permissions.iter().map(String::as_str).collect();
        parts.push(format!("perm[{}]", names.join(",")));
    }
    if !grant.file_read.is_empty() {
        parts.push(format!("read[{}]", grant.file_read.join(",")));
    }
    if !grant.file_write.is_empty() {
        parts.push(format!("write[{}]", grant.file_write.join(",")));
    }
    if grant.network {
        parts.push("net".to_string());
    }
    if grant.exec {
        parts.push("exec".to_string());
    }
    if parts.is_empty() {
        "(nothing)".to_string()
    } else {
        parts.join(" ")
    }
}

fn entry(plugin_id: &str, record: &GrantRecord) -> GrantEntry {
    GrantEntry {
        plugin_id: plugin_id.to_string(),
        granted_at: record.granted_at.to_rfc3339(),
        grant: record.grant.clone(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, TesseraError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| TesseraError::Internal(format!("failed to serialize output: {e}")))
}

/// Run `tessera grants list`.
pub fn run_list(config: &TesseraConfig, output: Output) -> Result<(), TesseraError> {
    let store = open_store(config)?;
    let records = store.records()?;

    if output.json {
        let entries: Vec<GrantEntry> = records.iter().map(|(id, r)| entry(id, r)).collect();
        println!("{}", to_json(&entries)?);
        return Ok(());
    }

    println!();
    println!("  grants ({})", store.path().display());
    println!("  {}", "-".repeat(35));
    if records.is_empty() {
        println!("    (none)");
    }
    for (id, record) in &records {
        let id = if output.color {
            id.bold().to_string()
        } else {
            id.clone()
        };
        println!(
            "    {id:<24} {}  {}",
            record.granted_at.format("%Y-%m-%d %H:%M"),
            summarize(&record.grant)
        );
    }
    println!();
    Ok(())
}

/// Run `tessera grants show <id>`.
pub fn run_show(config: &TesseraConfig, plugin_id: &str, output: Output) -> Result<(), TesseraError> {
    let store = open_store(config)?;
    let records = store.records()?;
    let record = records.get(plugin_id).ok_or_else(|| TesseraError::PermissionDenied {
        plugin_id: plugin_id.to_string(),
        reason: "no grant registered".to_string(),
    })?;

    if output.json {
        println!("{}", to_json(&entry(plugin_id, record))?);
    } else {
        let body = toml::to_string_pretty(&record.grant)
            .map_err(|e| TesseraError::Internal(format!("failed to render grant: {e}")))?;
        println!("# {plugin_id}, granted {}", record.granted_at.to_rfc3339());
        print!("{body}");
    }
    Ok(())
}

/// Run `tessera grants grant <id> ...`.
pub fn run_grant(config: &TesseraConfig, plugin_id: &str, grant: CapabilityGrant) -> Result<(), TesseraError> {
    let registry = open_registry(open_store(config)?)?;
    let summary = summarize(&grant);
    registry.grant(plugin_id, grant)?;
    info!(plugin_id = %plugin_id, "grant stored");
    println!("granted {plugin_id}: {summary}");
    Ok(())
}

/// Run `tessera grants revoke <id>`.
pub fn run_revoke(config: &TesseraConfig, plugin_id: &str) -> Result<(), TesseraError> {
    let registry = open_registry(open_store(config)?)?;
    match registry.revoke(plugin_id)? {
        Some(_) => println!("revoked {plugin_id}"),
        None => println!("{plugin_id} had no grant"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_lists_each_privilege() {
        let grant = build_grant(
            vec!["ocr.recognize".into()],
            vec!["/data/**".into()],
            vec![],
            true,
            false,
        );
        assert_eq!(summarize(&grant), "perm[ocr.recognize] read[/data/**] net");
    }

    #[test]
    fn summarize_empty_grant() {
        assert_eq!(summarize(&CapabilityGrant::empty()), "(nothing)");
    }

    #[test]
    fn grant_and_revoke_round_trip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TesseraConfig::default();
        config.sandbox.grant_store = Some(dir.path().join("grants.toml").display().to_string());

        run_grant(
            &config,
            "ocr-demo",
            build_grant(vec![], vec!["/data/*".into()], vec![], false, false),
        )
        .unwrap();
        let records = open_store(&config).unwrap().records().unwrap();
        assert_eq!(records["ocr-demo"].grant.file_read, vec!["/data/*"]);

        run_revoke(&config, "ocr-demo").unwrap();
        assert!(open_store(&config).unwrap().records().unwrap().is_empty());
    }

    #[test]
    fn invalid_pattern_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TesseraConfig::default();
        config.sandbox.grant_store = Some(dir.path().join("grants.toml").display().to_string());

        let err = run_grant(
            &config,
            "bad",
            build_grant(vec![], vec!["/data/../etc".into()], vec![], false, false),
        )
        .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidGrant { .. }));
        assert!(open_store(&config).unwrap().records().unwrap().is_empty());
    }

    #[test]
    fn show_unknown_plugin_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TesseraConfig::default();
        config.sandbox.grant_store = Some(dir.path().join("grants.toml").display().to_string());
        let output = Output {
            json: true,
            color: false,
        };
        assert!(run_show(&config, "ghost", output).is_err());
    }
}
