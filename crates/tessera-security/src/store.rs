// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Grant persistence.
//!
//! A [`GrantStore`] lets the capability registry survive restarts. The TOML
//! store rewrites the whole file through a temp file and rename, so a crash
//! mid-write leaves the previous file intact.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::{CapabilityGrant, TesseraError};
use tracing::debug;

/// Backing storage for capability grants.
pub trait GrantStore: Send + Sync {
    /// Load every persisted grant, keyed by plugin id.
    fn load_all(&self) -> Result<BTreeMap<String, CapabilityGrant>, TesseraError>;

    /// Insert or replace the grant for `plugin_id`.
    fn save(&self, plugin_id: &str, grant: &CapabilityGrant) -> Result<(), TesseraError>;

    /// Remove the grant for `plugin_id`. Removing an absent grant is not an error.
    fn remove(&self, plugin_id: &str) -> Result<(), TesseraError>;
}

/// In-memory store, used by tests and hosts that do not persist grants.
#[derive(Debug, Default)]
pub struct MemoryGrantStore {
    grants: Mutex<BTreeMap<String, CapabilityGrant>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GrantStore for MemoryGrantStore {
    fn load_all(&self) -> Result<BTreeMap<String, CapabilityGrant>, TesseraError> {
        let grants = self
            .grants
            .lock()
            .map_err(|e| TesseraError::Internal(format!("grant store lock poisoned: {e}")))?;
        Ok(grants.clone())
    }

    fn save(&self, plugin_id: &str, grant: &CapabilityGrant) -> Result<(), TesseraError> {
        self.grants
            .lock()
            .map_err(|e| TesseraError::Internal(format!("grant store lock poisoned: {e}")))?
            .insert(plugin_id.to_string(), grant.clone());
        Ok(())
    }

    fn remove(&self, plugin_id: &str) -> Result<(), TesseraError> {
        self.grants
            .lock()
            .map_err(|e| TesseraError::Internal(format!("grant store lock poisoned: {e}")))?
            .remove(plugin_id);
        Ok(())
    }
}

/// A persisted grant with the time it was issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantRecord {
    pub granted_at: DateTime<Utc>,
    pub grant: CapabilityGrant,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrantFile {
    #[serde(default)]
    grants: BTreeMap<String, GrantRecord>,
}

/// Grant store backed by a single TOML file.
///
/// ```toml
/// [grants.ocr-demo]
/// granted_at = "2026-10-19T08:00:00Z"
///
/// [grants.ocr-demo.grant]
/// permissions = ["ocr.recognize"]
/// file_read = ["/data/books/**"]
/// ```
#[derive(Debug)]
pub struct TomlGrantStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl TomlGrantStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records including their grant timestamps.
    pub fn records(&self) -> Result<BTreeMap<String, GrantRecord>, TesseraError> {
        Ok(self.read_file()?.grants)
    }

    fn read_file(&self) -> Result<GrantFile, TesseraError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(GrantFile::default()),
            Err(e) => return Err(TesseraError::Storage { source: Box::new(e) }),
        };
        toml::from_str(&content).map_err(|e| TesseraError::Storage { source: Box::new(e) })
    }

    fn write_file(&self, file: &GrantFile) -> Result<(), TesseraError> {
        let content =
            toml::to_string_pretty(file).map_err(|e| TesseraError::Storage { source: Box::new(e) })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| TesseraError::Storage { source: Box::new(e) })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| TesseraError::Storage { source: Box::new(e) })?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| TesseraError::Storage { source: Box::new(e) })?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| TesseraError::Storage { source: Box::new(e) })?;
        tmp.persist(&self.path)
            .map_err(|e| TesseraError::Storage { source: Box::new(e.error) })?;

        debug!(path = %self.path.display(), grants = file.grants.len(), "grant store written");
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut GrantFile) -> bool) -> Result<(), TesseraError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| TesseraError::Internal(format!("grant store lock poisoned: {e}")))?;
        let mut file = self.read_file()?;
        if f(&mut file) {
            self.write_file(&file)?;
        }
        Ok(())
    }
}

impl GrantStore for TomlGrantStore {
    fn load_all(&self) -> Result<BTreeMap<String, CapabilityGrant>, TesseraError> {
        Ok(self
            .read_file()?
            .grants
            .into_iter()
            .map(|(id, record)| (id, record.grant))
            .collect())
    }

    fn save(&self, plugin_id: &str, grant: &CapabilityGrant) -> Result<(), TesseraError> {
        self.modify(|file| {
            file.grants.insert(
                plugin_id.to_string(),
                GrantRecord {
                    granted_at: Utc::now(),
                    grant: grant.clone(),
                },
            );
            true
        })
    }

    fn remove(&self, plugin_id: &str) -> Result<(), TesseraError> {
        self.modify(|file| file.grants.remove(plugin_id).is_some())
    }
}
