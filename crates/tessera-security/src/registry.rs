// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-plugin capability grants.
//!
//! Readers load a snapshot of the grant map without locking; writers clone the
//! map, apply their change, and publish the new map in one atomic store. A
//! reader therefore sees either the old or the new grant, never a mix.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tessera_core::{CapabilityGrant, CapabilityRequest, TesseraError};
use tracing::info;

use crate::pattern::{PathPatterns, has_parent_segment};
use crate::store::GrantStore;

/// A grant with its path patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledGrant {
    grant: CapabilityGrant,
    read: PathPatterns,
    write: PathPatterns,
}

impl CompiledGrant {
    /// Compile a grant, rejecting malformed or traversing path patterns.
    pub fn compile(plugin_id: &str, grant: CapabilityGrant) -> Result<Self, TesseraError> {
        let invalid = |message: String| TesseraError::InvalidGrant {
            plugin_id: plugin_id.to_string(),
            message,
        };
        let read = PathPatterns::compile(&grant.file_read).map_err(invalid)?;
        let write = PathPatterns::compile(&grant.file_write).map_err(invalid)?;
        Ok(Self { grant, read, write })
    }

    pub fn grant(&self) -> &CapabilityGrant {
        &self.grant
    }

    /// Evaluate a request. `Err` carries the denial reason.
    pub fn evaluate(&self, request: &CapabilityRequest) -> Result<(), String> {
        match request {
            CapabilityRequest::Permission(name) => {
                if self.grant.permissions.contains(name) {
                    Ok(())
                } else {
                    Err(format!("permission '{name}' not granted"))
                }
            }
            CapabilityRequest::FileRead(path) => self.check_path("read", &self.read, path),
            CapabilityRequest::FileWrite(path) => self.check_path("write", &self.write, path),
            CapabilityRequest::Connect { host, port } => {
                if self.grant.network {
                    Ok(())
                } else {
                    Err(format!("network access to {host}:{port} not granted"))
                }
            }
            CapabilityRequest::Exec(command) => {
                if self.grant.exec {
                    Ok(())
                } else {
                    Err(format!("code execution of '{command}' not granted"))
                }
            }
        }
    }

    fn check_path(&self, verb: &str, patterns: &PathPatterns, path: &str) -> Result<(), String> {
        if has_parent_segment(path) {
            return Err(format!("{verb} of '{path}' denied: path contains '..'"));
        }
        if patterns.matches(path) {
            Ok(())
        } else {
            Err(format!("{verb} of '{path}' not covered by any granted pattern"))
        }
    }
}

type GrantMap = HashMap<String, Arc<CompiledGrant>>;

/// Copy-on-write registry of capability grants keyed by plugin id.
pub struct CapabilityRegistry {
    grants: ArcSwap<GrantMap>,
    store: Option<Arc<dyn GrantStore>>,
    // Orders writers so store writes and map publication happen together.
    write_lock: Mutex<()>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    /// An empty, non-persistent registry.
    pub fn new() -> Self {
        Self {
            grants: ArcSwap::from_pointee(HashMap::new()),
            store: None,
            write_lock: Mutex::new(()),
        }
    }

    /// A registry that loads every grant from `store` and writes through on change.
    pub fn with_store(store: Arc<dyn GrantStore>) -> Result<Self, TesseraError> {
        let mut map = HashMap::new();
        for (id, grant) in store.load_all()? {
            let compiled = CompiledGrant::compile(&id, grant)?;
            map.insert(id, Arc::new(compiled));
        }
        info!(grants = map.len(), "capability grants loaded");
        Ok(Self {
            grants: ArcSwap::from_pointee(map),
            store: Some(store),
            write_lock: Mutex::new(()),
        })
    }

    /// Register or replace the grant for `plugin_id`.
    pub fn grant(&self, plugin_id: &str, grant: CapabilityGrant) -> Result<(), TesseraError> {
        let compiled = Arc::new(CompiledGrant::compile(plugin_id, grant)?);
        let _guard = self.lock_writers()?;
        if let Some(store) = &self.store {
            store.save(plugin_id, compiled.grant())?;
        }
        let mut next = GrantMap::clone(&self.grants.load());
        next.insert(plugin_id.to_string(), compiled);
        self.grants.store(Arc::new(next));
        info!(plugin_id = %plugin_id, "capabilities granted");
        Ok(())
    }

    /// Remove the grant for `plugin_id`, returning it if one existed.
    pub fn revoke(&self, plugin_id: &str) -> Result<Option<CapabilityGrant>, TesseraError> {
        let _guard = self.lock_writers()?;
        let current = self.grants.load();
        if !current.contains_key(plugin_id) {
            return Ok(None);
        }
        if let Some(store) = &self.store {
            store.remove(plugin_id)?;
        }
        let mut next = GrantMap::clone(&current);
        let removed = next.remove(plugin_id);
        self.grants.store(Arc::new(next));
        info!(plugin_id = %plugin_id, "capabilities revoked");
        Ok(removed.map(|c| c.grant().clone()))
    }

    pub fn get(&self, plugin_id: &str) -> Option<CapabilityGrant> {
        self.compiled(plugin_id).map(|c| c.grant().clone())
    }

    /// The compiled grant for `plugin_id`, as of this instant.
    pub fn compiled(&self, plugin_id: &str) -> Option<Arc<CompiledGrant>> {
        self.grants.load().get(plugin_id).cloned()
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.grants.load().contains_key(plugin_id)
    }

    pub fn len(&self) -> usize {
        self.grants.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plugin ids with a grant, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.grants.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock_writers(&self) -> Result<std::sync::MutexGuard<'_, ()>, TesseraError> {
        self.write_lock
            .lock()
            .map_err(|e| TesseraError::Internal(format!("capability registry lock poisoned: {e}")))
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("grants", &self.ids())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGrantStore;

    #[test]
    fn grant_get_revoke() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_empty());

        registry
            .grant("ocr-demo", CapabilityGrant::empty().with_permission("ocr"))
            .unwrap();
        assert!(registry.contains("ocr-demo"));
        assert_eq!(registry.ids(), vec!["ocr-demo"]);

        let revoked = registry.revoke("ocr-demo").unwrap();
        assert!(revoked.is_some());
        assert!(registry.get("ocr-demo").is_none());
        assert!(registry.revoke("ocr-demo").unwrap().is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected_without_mutation() {
        let registry = CapabilityRegistry::new();
        let err = registry
            .grant("bad", CapabilityGrant::empty().allow_read("/tmp/[oops"))
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidGrant { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_held_by_reader_survives_revoke() {
        let registry = CapabilityRegistry::new();
        registry
            .grant("p", CapabilityGrant::empty().allow_network())
            .unwrap();
        let held = registry.compiled("p").unwrap();
        registry.revoke("p").unwrap();
        assert!(held.grant().network);
        assert!(registry.compiled("p").is_none());
    }

    #[test]
    fn evaluate_each_capability_kind() {
        let grant = CompiledGrant::compile(
            "p",
            CapabilityGrant::empty()
                .with_permission("log")
                .allow_read("/data/**")
                .allow_write("/tmp/*.txt")
                .allow_exec(),
        )
        .unwrap();

        assert!(grant.evaluate(&CapabilityRequest::Permission("log".into())).is_ok());
        assert!(grant.evaluate(&CapabilityRequest::Permission("admin".into())).is_err());
        assert!(grant.evaluate(&CapabilityRequest::FileRead("/data/a/b".into())).is_ok());
        assert!(grant.evaluate(&CapabilityRequest::FileWrite("/data/a".into())).is_err());
        assert!(grant.evaluate(&CapabilityRequest::FileWrite("/tmp/out.txt".into())).is_ok());
        assert!(grant.evaluate(&CapabilityRequest::FileWrite("/tmp/x/out.txt".into())).is_err());
        assert!(grant.evaluate(&CapabilityRequest::Exec("sh".into())).is_ok());
        let reason = grant
            .evaluate(&CapabilityRequest::Connect {
                host: "example.com".into(),
                port: 443,
            })
            .unwrap_err();
        assert!(reason.contains("example.com:443"));
    }

    #[test]
    fn traversal_is_denied_even_under_wide_pattern() {
        let grant =
            CompiledGrant::compile("p", CapabilityGrant::empty().allow_read("/**")).unwrap();
        let reason = grant
            .evaluate(&CapabilityRequest::FileRead("/data/../etc/shadow".into()))
            .unwrap_err();
        assert!(reason.contains(".."));
    }

    #[test]
    fn store_is_loaded_and_written_through() {
        let store = Arc::new(MemoryGrantStore::new());
        store
            .save("pre", &CapabilityGrant::empty().allow_network())
            .unwrap();

        let registry = CapabilityRegistry::with_store(store.clone()).unwrap();
        assert!(registry.get("pre").unwrap().network);

        registry.grant("new", CapabilityGrant::empty()).unwrap();
        registry.revoke("pre").unwrap();

        let persisted = store.load_all().unwrap();
        assert!(persisted.contains_key("new"));
        assert!(!persisted.contains_key("pre"));
    }
}
