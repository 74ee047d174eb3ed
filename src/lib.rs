// Library crate for the chatbus event bus
// This file exposes the public API for integration tests and embedding applications

pub mod config;
pub mod event;
pub mod relay;
pub mod shared;
pub mod transport;

// Re-export commonly used types for easier access
pub use config::{RelayConfig, TransportConfig};
pub use event::{DispatchError, Event, EventDispatcher, EventError, EventListener};
pub use shared::{AppError, AppState};
pub use transport::{InMemoryHub, Transport, TransportError, WebSocketTransport};
pub use tokio_util::sync::CancellationToken;
