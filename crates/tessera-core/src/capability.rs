// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability grants and the privileged requests checked against them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TesseraError;

/// Privileges granted to one plugin by the host.
///
/// File patterns are globs: `*` matches within one path segment, `**` matches
/// across segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityGrant {
    /// Generic permission names, matched exactly.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    /// Path patterns the plugin may read.
    #[serde(default)]
    pub file_read: Vec<String>,
    /// Path patterns the plugin may write.
    #[serde(default)]
    pub file_write: Vec<String>,
    /// Whether outbound network connections are allowed.
    #[serde(default)]
    pub network: bool,
    /// Whether the plugin may execute code or commands.
    #[serde(default)]
    pub exec: bool,
}

impl CapabilityGrant {
    /// A grant that allows nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_permission(mut self, name: impl Into<String>) -> Self {
        self.permissions.insert(name.into());
        self
    }

    pub fn allow_read(mut self, pattern: impl Into<String>) -> Self {
        self.file_read.push(pattern.into());
        self
    }

    pub fn allow_write(mut self, pattern: impl Into<String>) -> Self {
        self.file_write.push(pattern.into());
        self
    }

    pub fn allow_network(mut self) -> Self {
        self.network = true;
        self
    }

    pub fn allow_exec(mut self) -> Self {
        self.exec = true;
        self
    }
}

/// The kind of privileged action being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CapabilityKind {
    Permission,
    FileRead,
    FileWrite,
    Network,
    Exec,
}

/// A single privileged action a plugin is attempting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityRequest {
    /// A named generic permission.
    Permission(String),
    /// Reading the file at this path.
    FileRead(String),
    /// Writing the file at this path.
    FileWrite(String),
    /// Connecting to a remote endpoint.
    Connect { host: String, port: u16 },
    /// Executing a command.
    Exec(String),
}

impl CapabilityRequest {
    /// Build a request from a kind and a free-form detail string.
    ///
    /// Network details are `host:port`; every other kind takes the detail verbatim.
    pub fn parse(kind: CapabilityKind, detail: &str) -> Result<Self, TesseraError> {
        Ok(match kind {
            CapabilityKind::Permission => CapabilityRequest::Permission(detail.to_string()),
            CapabilityKind::FileRead => CapabilityRequest::FileRead(detail.to_string()),
            CapabilityKind::FileWrite => CapabilityRequest::FileWrite(detail.to_string()),
            CapabilityKind::Exec => CapabilityRequest::Exec(detail.to_string()),
            CapabilityKind::Network => {
                let (host, port) = detail.rsplit_once(':').ok_or_else(|| {
                    TesseraError::Config(format!("network detail must be host:port, got '{detail}'"))
                })?;
                let port = port.parse::<u16>().map_err(|e| {
                    TesseraError::Config(format!("invalid port in '{detail}': {e}"))
                })?;
                CapabilityRequest::Connect {
                    host: host.to_string(),
                    port,
                }
            }
        })
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityRequest::Permission(_) => CapabilityKind::Permission,
            CapabilityRequest::FileRead(_) => CapabilityKind::FileRead,
            CapabilityRequest::FileWrite(_) => CapabilityKind::FileWrite,
            CapabilityRequest::Connect { .. } => CapabilityKind::Network,
            CapabilityRequest::Exec(_) => CapabilityKind::Exec,
        }
    }
}

impl fmt::Display for CapabilityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityRequest::Permission(name) => write!(f, "permission '{name}'"),
            CapabilityRequest::FileRead(path) => write!(f, "read '{path}'"),
            CapabilityRequest::FileWrite(path) => write!(f, "write '{path}'"),
            CapabilityRequest::Connect { host, port } => write!(f, "connect {host}:{port}"),
            CapabilityRequest::Exec(cmd) => write!(f, "exec '{cmd}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parse_network_detail() {
        let req = CapabilityRequest::parse(CapabilityKind::Network, "example.com:443").unwrap();
        assert_eq!(
            req,
            CapabilityRequest::Connect {
                host: "example.com".into(),
                port: 443
            }
        );
        assert!(CapabilityRequest::parse(CapabilityKind::Network, "example.com").is_err());
        assert!(CapabilityRequest::parse(CapabilityKind::Network, "example.com:http").is_err());
    }

    #[test]
    fn kind_parses_snake_case() {
        assert_eq!(CapabilityKind::from_str("file_read").unwrap(), CapabilityKind::FileRead);
        assert_eq!(CapabilityKind::from_str("EXEC").unwrap(), CapabilityKind::Exec);
    }

    #[test]
    fn grant_deserializes_with_defaults() {
        let grant: CapabilityGrant = serde_json::from_str(r#"{"file_read": ["/tmp/*"]}"#).unwrap();
        assert_eq!(grant.file_read, vec!["/tmp/*"]);
        assert!(!grant.network);
        assert!(grant.permissions.is_empty());
    }

    #[test]
    fn grant_rejects_unknown_fields() {
        let result: Result<CapabilityGrant, _> = serde_json::from_str(r#"{"root": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn builder_accumulates() {
        let grant = CapabilityGrant::empty()
            .with_permission("storage.read")
            .allow_read("/tmp/*")
            .allow_network();
        assert!(grant.permissions.contains("storage.read"));
        assert!(grant.network);
        assert!(!grant.exec);
    }
}
