use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::handler::EventListener;

/// Registry of listeners keyed by event type
///
/// Each event type maps to exactly one listener; registering a type again
/// replaces the previous listener. Clones share the same underlying map, so
/// a registry handed to a delivery task observes later registrations.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<RwLock<HashMap<String, Arc<dyn EventListener>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the listener for an event type, replacing any previous one
    pub async fn register(&self, event_type: impl Into<String>, listener: Arc<dyn EventListener>) {
        let event_type = event_type.into();
        debug!(
            event_type = %event_type,
            listener = listener.name(),
            "Registering event listener"
        );

        let mut listeners = self.listeners.write().await;
        listeners.insert(event_type, listener);
    }

    /// Removes the listener for an event type, returning it if there was one
    pub async fn unregister(&self, event_type: &str) -> Option<Arc<dyn EventListener>> {
        let mut listeners = self.listeners.write().await;
        listeners.remove(event_type)
    }

    /// Looks up the listener for an exact event type
    pub async fn lookup(&self, event_type: &str) -> Option<Arc<dyn EventListener>> {
        let listeners = self.listeners.read().await;
        listeners.get(event_type).cloned()
    }

    /// Lists the registered event types, in no particular order
    pub async fn event_types(&self) -> Vec<String> {
        let listeners = self.listeners.read().await;
        listeners.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.listeners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.listeners.read().await.is_empty()
    }
}
