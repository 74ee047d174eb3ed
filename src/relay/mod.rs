// WebSocket relay
//
// A small chat service for the event bus: clients connect over a websocket,
// optionally join a channel, and exchange opaque text bodies either with the
// whole channel or with a single identity.

use axum::{routing::get, Router};

use crate::shared::AppState;

// Public API
pub use connection_manager::{ConnectionManager, InMemoryConnectionManager};
pub use handler::{RelayReceiveHandler, IDENTITY_HEADER};
pub use messages::{FrameType, RelayFrame};
pub use socket::{Connection, Disconnect, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod connection_manager;
mod handler;
mod messages;
mod socket;

/// Builds the relay routes
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "chatbus relay" }))
        .route("/ws", get(handler::direct_websocket_handler))
        .route("/ws/:channel", get(handler::channel_websocket_handler))
        .with_state(app_state)
}
