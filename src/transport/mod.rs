// Transport layer
//
// The event dispatcher only needs a handful of primitives from the chat
// service underneath it: connect, send to the channel, send to one
// recipient, receive (blocking or by callback), and disconnect.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::TransportConfig;

// Public API
pub use memory::{InMemoryHub, InMemoryTransport};
pub use websocket::WebSocketTransport;

// Internal modules
mod inbox;
mod memory;
mod websocket;

#[cfg(test)]
pub mod test_utils;

/// Errors raised by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Transport is not connected")]
    NotConnected,

    #[error("No channel joined")]
    NoChannel,

    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("Messages are already being delivered")]
    AlreadySubscribed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Callback invoked by a transport for every inbound message
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle_inbound(&self, message: String);
}

/// The chat service as seen by the event dispatcher
///
/// Implementations must allow sends while another task is blocked in
/// [`Transport::receive_next`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect and join the configured channel, if any
    async fn connect(&self, config: &TransportConfig) -> Result<(), TransportError>;

    /// Send a message body to every other member of the channel
    async fn send_to_channel(&self, body: String) -> Result<(), TransportError>;

    /// Send a message body to a single recipient
    async fn send_to_recipient(&self, recipient: &str, body: String)
        -> Result<(), TransportError>;

    /// Wait for the next inbound message (None once disconnected)
    async fn receive_next(&self) -> Result<Option<String>, TransportError>;

    /// Deliver every future inbound message to the handler
    async fn on_message(&self, handler: Arc<dyn InboundHandler>) -> Result<(), TransportError>;

    /// Identity this transport is connected as
    async fn local_identity(&self) -> Option<String>;

    /// Disconnect; calling this on a disconnected transport is a no-op
    async fn disconnect(&self) -> Result<(), TransportError>;
}
