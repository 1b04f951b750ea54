// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tessera check` command implementation.
//!
//! Evaluates one privileged request against the persisted grants with the
//! same enforcer the host uses, including `sandbox.enabled` and
//! `sandbox.default_grant`.

use colored::Colorize;
use serde::Serialize;
use tessera_config::TesseraConfig;
use tessera_core::{CapabilityKind, CapabilityRequest, TesseraError};
use tessera_security::SandboxEnforcer;

use crate::Output;
use crate::grants::{open_registry, open_store};

/// Structured verdict for `--json` mode.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub plugin_id: String,
    pub request: String,
    pub allowed: bool,
    pub reason: Option<String>,
}

/// Evaluate `kind`/`detail` for `plugin_id` against `enforcer`.
pub fn evaluate(
    enforcer: &SandboxEnforcer,
    plugin_id: &str,
    kind: CapabilityKind,
    detail: &str,
) -> Result<CheckResponse, TesseraError> {
    let request = CapabilityRequest::parse(kind, detail)?;
    let verdict = enforcer.check_plugin(plugin_id, &request);
    let reason = match verdict {
        Ok(()) => None,
        Err(TesseraError::PermissionDenied { reason, .. }) => Some(reason),
        Err(other) => return Err(other),
    };
    Ok(CheckResponse {
        plugin_id: plugin_id.to_string(),
        request: request.to_string(),
        allowed: reason.is_none(),
        reason,
    })
}

/// Run `tessera check <id> <kind> <detail>`. A denial exits non-zero.
pub fn run_check(
    config: &TesseraConfig,
    plugin_id: &str,
    kind: CapabilityKind,
    detail: &str,
    output: Output,
) -> Result<(), TesseraError> {
    let registry = open_registry(open_store(config)?)?;
    let enforcer = SandboxEnforcer::from_config(&config.sandbox, registry)?;
    let response = evaluate(&enforcer, plugin_id, kind, detail)?;

    if output.json {
        let body = serde_json::to_string_pretty(&response)
            .map_err(|e| TesseraError::Internal(format!("failed to serialize output: {e}")))?;
        println!("{body}");
    } else {
        let verdict = match (response.allowed, output.color) {
            (true, true) => "allowed".green().to_string(),
            (true, false) => "allowed".to_string(),
            (false, true) => "denied".red().to_string(),
            (false, false) => "denied".to_string(),
        };
        println!("{plugin_id}: {} -> {verdict}", response.request);
    }

    match response.reason {
        None => Ok(()),
        Some(reason) => Err(TesseraError::PermissionDenied {
            plugin_id: plugin_id.to_string(),
            reason,
        }),
    }
}
