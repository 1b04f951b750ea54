// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete plugin host.
//!
//! Each test builds its own registry, sandbox and grant store. Tests are
//! independent and order-insensitive.

use std::sync::Arc;

use serde_json::json;
use tessera_core::{
    CapabilityGrant, CapabilityRequest, ConfigMap, HealthStatus, Operation, PluginState, PluginType,
};
use tessera_plugin::{PluginEvent, PluginRegistry, PluginTypeRegistry};
use tessera_security::{CapabilityRegistry, SandboxEnforcer, TomlGrantStore};
use tessera_test_utils::{Outcome, ScriptedPlugin, config, descriptor};

fn read_tmp_png() -> Outcome {
    Outcome::Check(CapabilityRequest::FileRead("/tmp/a.png".into()))
}

// ---- OCR plugin: denied without a grant, allowed after one ----

#[tokio::test]
async fn ocr_plugin_reads_only_after_grant() {
    let enforcer = Arc::new(SandboxEnforcer::new(Arc::new(CapabilityRegistry::new())));
    let registry = PluginRegistry::new(PluginTypeRegistry::builtin(), enforcer).unwrap();

    let ocr = Arc::new(
        ScriptedPlugin::new()
            .with(Operation::HandleEvent, read_tmp_png())
            .with(Operation::HandleEvent, read_tmp_png()),
    );
    registry
        .register(descriptor("ocr-demo", PluginType::Ocr), ocr.clone())
        .unwrap();
    registry
        .initialize("ocr-demo", config(&[("language", json!("eng"))]))
        .await
        .unwrap();
    registry.start("ocr-demo").await.unwrap();
    assert_eq!(registry.state("ocr-demo").unwrap(), PluginState::Running);

    let err = registry
        .handle_event("ocr-demo", "page.scanned", json!({"page": 1}))
        .await
        .unwrap_err();
    assert!(err.root_cause().is_permission_denied());
    assert_eq!(registry.state("ocr-demo").unwrap(), PluginState::Running);

    registry
        .grant_capabilities("ocr-demo", CapabilityGrant::empty().allow_read("/tmp/*"))
        .unwrap();
    registry
        .handle_event("ocr-demo", "page.scanned", json!({"page": 1}))
        .await
        .unwrap();

    let verdicts: Vec<bool> = ocr.checks().into_iter().map(|(_, ok)| ok).collect();
    assert_eq!(verdicts, vec![false, true]);
    assert_eq!(registry.configuration("ocr-demo").unwrap()["language"], "eng");
}

// ---- Full lifecycle through teardown ----

#[tokio::test]
async fn plugin_runs_full_lifecycle_and_unregisters() {
    let enforcer = Arc::new(SandboxEnforcer::new(Arc::new(CapabilityRegistry::new())));
    let registry = PluginRegistry::new(PluginTypeRegistry::builtin(), enforcer).unwrap();
    let mut events = registry.subscribe();

    let exporter = Arc::new(ScriptedPlugin::new());
    exporter.set_metric("pages.exported", json!(12));
    registry
        .register(descriptor("pdf-export", PluginType::Exporter), exporter.clone())
        .unwrap();

    registry.initialize("pdf-export", ConfigMap::new()).await.unwrap();
    registry.start("pdf-export").await.unwrap();
    registry
        .update_configuration("pdf-export", config(&[("dpi", json!(300))]))
        .await
        .unwrap();
    registry.stop("pdf-export").await.unwrap();
    registry.destroy("pdf-export").await.unwrap();

    let metrics = registry.metrics("pdf-export").unwrap();
    assert_eq!(metrics["pages.exported"], 12);
    assert_eq!(metrics["lifecycle.transitions"], 4);
    assert_eq!(registry.configuration("pdf-export").unwrap()["dpi"], 300);
    assert_eq!(registry.health("pdf-export").unwrap(), HealthStatus::Healthy);

    let descriptor = registry.unregister("pdf-export").unwrap();
    assert_eq!(descriptor.id, "pdf-export");
    assert!(registry.is_empty());

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PluginEvent::StateChanged { to, .. } = event {
            states.push(to);
        }
    }
    assert_eq!(states.last(), Some(&PluginState::Unloaded));
    assert_eq!(
        exporter.calls(),
        vec![
            Operation::Initialize,
            Operation::Start,
            Operation::Configure,
            Operation::Stop,
            Operation::Destroy,
        ]
    );
}

// ---- Persisted grants survive a restart ----

#[tokio::test]
async fn persisted_grant_is_enforced_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grants.toml");

    {
        let store = Arc::new(TomlGrantStore::open(&path));
        let capabilities = Arc::new(CapabilityRegistry::with_store(store).unwrap());
        let enforcer = Arc::new(SandboxEnforcer::new(capabilities));
        let registry = PluginRegistry::new(PluginTypeRegistry::builtin(), enforcer).unwrap();
        registry
            .grant_capabilities(
                "vault",
                CapabilityGrant::empty().with_permission("crypto.sign"),
            )
            .unwrap();
    }

    let store = Arc::new(TomlGrantStore::open(&path));
    let capabilities = Arc::new(CapabilityRegistry::with_store(store).unwrap());
    assert!(capabilities.contains("vault"));
    let enforcer = Arc::new(SandboxEnforcer::new(capabilities));
    let registry = PluginRegistry::new(PluginTypeRegistry::builtin(), enforcer).unwrap();

    let vault = Arc::new(ScriptedPlugin::new().with(
        Operation::Start,
        Outcome::Check(CapabilityRequest::Permission("crypto.sign".into())),
    ));
    registry
        .register(descriptor("vault", PluginType::Security), vault.clone())
        .unwrap();
    registry.initialize("vault", ConfigMap::new()).await.unwrap();
    registry.start("vault").await.unwrap();
    assert_eq!(vault.checks().len(), 1);
    assert!(vault.checks()[0].1);

    registry.stop("vault").await.unwrap();
    registry.revoke_capabilities("vault").unwrap();
    let reloaded = CapabilityRegistry::with_store(Arc::new(TomlGrantStore::open(&path))).unwrap();
    assert!(reloaded.is_empty());
}

// ---- Configuration drives the host ----

#[tokio::test]
async fn configured_host_applies_default_grant_and_overrides() {
    let host_config = tessera_config::load_and_validate_str(
        r#"
[host]
api_version = 2

[sandbox.default_grant]
permissions = ["ui.render"]

[types.THEME]
max_instances = 1
"#,
    )
    .unwrap();
    let registry = PluginRegistry::from_config(&host_config, Arc::new(CapabilityRegistry::new())).unwrap();

    let theme = Arc::new(ScriptedPlugin::new().with(
        Operation::Start,
        Outcome::Check(CapabilityRequest::Permission("ui.render".into())),
    ));
    registry
        .register(
            descriptor("dark", PluginType::Theme).with_api_range(1, 2),
            theme.clone(),
        )
        .unwrap();
    assert!(
        registry
            .register(
                descriptor("light", PluginType::Theme).with_api_range(1, 2),
                Arc::new(ScriptedPlugin::new()),
            )
            .is_err()
    );

    registry.initialize("dark", ConfigMap::new()).await.unwrap();
    registry.start("dark").await.unwrap();
    assert!(theme.checks()[0].1);

    // Host API 2 is outside the fixture's default 1..=1 range.
    assert!(
        registry
            .register(descriptor("legacy", PluginType::Utility), Arc::new(ScriptedPlugin::new()))
            .is_err()
    );
}
