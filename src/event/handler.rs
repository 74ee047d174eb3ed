use async_trait::async_trait;

use super::events::Event;

/// Trait for components that react to one type of event
///
/// Listeners are registered against an event type name and receive every
/// decoded event of that type. They return nothing: a listener that fails
/// is expected to deal with the failure itself.
///
/// Listeners may be invoked from whatever task the transport delivers on,
/// so any state they share must be safe under concurrent access.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Process one event
    async fn process_event(&self, event: &Event);

    /// Get a human-readable name for this listener (for logging/debugging)
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Adapts a plain closure into an [`EventListener`]
pub struct FnListener<F> {
    callback: F,
}

impl<F> FnListener<F>
where
    F: Fn(&Event) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> EventListener for FnListener<F>
where
    F: Fn(&Event) + Send + Sync,
{
    async fn process_event(&self, event: &Event) {
        (self.callback)(event)
    }

    fn name(&self) -> &'static str {
        "FnListener"
    }
}

/// A listener that does nothing
///
/// Useful to claim an event type in tests where the reaction doesn't matter.
pub struct NoOpListener;

#[async_trait]
impl EventListener for NoOpListener {
    async fn process_event(&self, _event: &Event) {}

    fn name(&self) -> &'static str {
        "NoOpListener"
    }
}
