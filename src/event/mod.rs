// Event dispatch layer
//
// Events travel between participants as JSON envelopes on a shared channel.
// This module encodes and decodes those envelopes, keeps the registry of
// listeners, and drives delivery from a transport to the listeners.

// Public API - what other modules can use
pub use codec::{decode, encode, EventError};
pub use dispatcher::{DispatchError, EventDispatcher};
pub use events::Event;
pub use handler::{EventListener, FnListener, NoOpListener};
pub use registry::ListenerRegistry;

// Internal modules
mod codec;
mod dispatcher;
mod events;
mod handler;
mod registry;
