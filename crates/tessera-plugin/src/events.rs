// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-facing notifications about plugin registration, lifecycle and grants.

use tessera_core::{Operation, PluginState, PluginType};
use tokio::sync::broadcast;

/// A notification broadcast to every subscriber of the plugin registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    Registered {
        plugin_id: String,
        plugin_type: PluginType,
    },
    Unregistered {
        plugin_id: String,
    },
    StateChanged {
        plugin_id: String,
        from: PluginState,
        to: PluginState,
    },
    /// A unit of work failed; the instance took its failure edge.
    Failed {
        plugin_id: String,
        operation: Operation,
        message: String,
    },
    /// A plugin of a critical type failed. The host should treat this as fatal.
    Fatal {
        plugin_id: String,
        plugin_type: PluginType,
        message: String,
    },
    CapabilitiesGranted {
        plugin_id: String,
    },
    CapabilitiesRevoked {
        plugin_id: String,
    },
}

impl PluginEvent {
    pub fn plugin_id(&self) -> &str {
        match self {
            PluginEvent::Registered { plugin_id, .. }
            | PluginEvent::Unregistered { plugin_id }
            | PluginEvent::StateChanged { plugin_id, .. }
            | PluginEvent::Failed { plugin_id, .. }
            | PluginEvent::Fatal { plugin_id, .. }
            | PluginEvent::CapabilitiesGranted { plugin_id }
            | PluginEvent::CapabilitiesRevoked { plugin_id } => plugin_id,
        }
    }
}

/// Sending half shared by the registry and every lifecycle controller.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<PluginEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: PluginEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let sink = EventSink::new(8);
        let mut rx = sink.subscribe();
        sink.emit(PluginEvent::Unregistered {
            plugin_id: "a".into(),
        });
        sink.emit(PluginEvent::CapabilitiesGranted {
            plugin_id: "b".into(),
        });
        assert_eq!(rx.recv().await.unwrap().plugin_id(), "a");
        assert_eq!(rx.recv().await.unwrap().plugin_id(), "b");
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        EventSink::new(1).emit(PluginEvent::Unregistered {
            plugin_id: "x".into(),
        });
    }
}
