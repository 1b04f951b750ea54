// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tessera types` command implementation.

use colored::Colorize;
use serde::Serialize;
use tessera_config::TesseraConfig;
use tessera_core::{PluginType, TesseraError};
use tessera_plugin::{PluginTypeRegistry, TypePolicy};

use crate::Output;

/// One row of the effective type table.
#[derive(Debug, Serialize)]
pub struct TypeRow {
    pub plugin_type: String,
    pub critical: bool,
    pub requires_grant: bool,
    /// `-1` means unbounded.
    pub max_instances: i64,
}

impl TypeRow {
    fn new(plugin_type: PluginType, policy: TypePolicy) -> Self {
        Self {
            plugin_type: plugin_type.to_string(),
            critical: policy.critical,
            requires_grant: policy.requires_grant,
            max_instances: i64::from(policy.max_instances),
        }
    }
}

/// The built-in table with `[types]` overrides applied.
pub fn effective_rows(config: &TesseraConfig) -> Result<Vec<TypeRow>, TesseraError> {
    let table = PluginTypeRegistry::with_overrides(&config.types)?;
    Ok(table.iter().map(|(t, p)| TypeRow::new(t, p)).collect())
}

fn flag(on: bool, color: bool) -> String {
    match (on, color) {
        (true, true) => "yes".yellow().to_string(),
        (true, false) => "yes".to_string(),
        (false, _) => "-".to_string(),
    }
}

/// Run `tessera types`.
pub fn run_types(config: &TesseraConfig, output: Output) -> Result<(), TesseraError> {
    let rows = effective_rows(config)?;

    if output.json {
        let body = serde_json::to_string_pretty(&rows)
            .map_err(|e| TesseraError::Internal(format!("failed to serialize output: {e}")))?;
        println!("{body}");
        return Ok(());
    }

    println!();
    println!("  {:<18} {:<9} {:<7} MAX", "TYPE", "CRITICAL", "GRANT");
    println!("  {}", "-".repeat(42));
    for row in &rows {
        let max = if row.max_instances < 0 {
            "unbounded".to_string()
        } else {
            row.max_instances.to_string()
        };
        println!(
            "  {:<18} {:<9} {:<7} {max}",
            row.plugin_type,
            flag(row.critical, output.color),
            flag(row.requires_grant, output.color),
        );
    }
    println!();
    Ok(())
}
