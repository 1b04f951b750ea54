// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests: the controller follows the transition table for any
//! sequence of lifecycle calls and work-unit outcomes.

use std::sync::Arc;

use proptest::prelude::*;
use tessera_core::{ConfigMap, HealthStatus, Operation, PluginState, PluginType, TesseraError};
use tessera_plugin::{EventSink, PluginLifecycleController};
use tessera_security::{CapabilityRegistry, SandboxEnforcer};
use tessera_test_utils::{Outcome, ScriptedPlugin, descriptor};

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Initialize),
        Just(Operation::Start),
        Just(Operation::Stop),
        Just(Operation::Destroy),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn controller_tracks_transition_table(steps in prop::collection::vec((operation(), any::<bool>()), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let plugin = Arc::new(ScriptedPlugin::new());
        let controller = PluginLifecycleController::new(
            descriptor("prop", PluginType::Utility),
            plugin.clone(),
            Arc::new(SandboxEnforcer::new(Arc::new(CapabilityRegistry::new()))),
            runtime.handle().clone(),
            false,
            EventSink::new(8),
        );

        let mut model = PluginState::Unloaded;
        for (operation, succeed) in steps {
            let expected = operation.transition_from(model);
            if expected.is_some() && !succeed {
                plugin.push(operation, Outcome::Fail("scripted".into()));
            }

            let result = runtime.block_on(async {
                match operation {
                    Operation::Initialize => controller.initialize(ConfigMap::new()).await,
                    Operation::Start => controller.start().await,
                    Operation::Stop => controller.stop().await,
                    _ => controller.destroy().await,
                }
            });

            match expected {
                None => {
                    let rejected = matches!(result, Err(TesseraError::InvalidStateTransition { .. }));
                    prop_assert!(rejected);
                }
                Some(transition) if succeed => {
                    prop_assert!(result.is_ok());
                    model = transition.target;
                }
                Some(transition) => {
                    prop_assert!(result.is_err());
                    prop_assert_eq!(controller.health(), HealthStatus::Unhealthy);
                    model = transition.on_failure;
                }
            }
            prop_assert_eq!(controller.state(), model);
            prop_assert!(!model.is_transient());
        }
    }
}
