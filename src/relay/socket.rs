use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::RelayFrame;

/// Text-frame view of a client socket, so the relay loop can be driven by
/// something other than a live axum connection
#[async_trait]
pub trait SocketWrapper: Send {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Next text frame, `None` once the client has gone
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for frames a client sends to the relay
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, identity: &str, channel: Option<&str>, message: String);
}

/// Why a relay connection ended without a socket error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The client closed the socket
    ClientClosed,
    /// Another connection registered the same identity
    Replaced,
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Ping/pong are answered by axum; binary frames are not part of the protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// One client's seat on the relay
///
/// Frames queued for the client by the connection manager are written to the
/// socket; frames the client sends are routed through the message handler
/// under the identity and channel it connected with.
pub struct Connection {
    pub identity: String,
    pub channel: Option<String>,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        identity: String,
        channel: Option<String>,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            identity,
            channel,
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Relays frames both ways until the client leaves or its identity is
    /// taken over by a newer connection
    ///
    /// Queued deliveries are flushed before the next client frame is read. A
    /// replaced client gets an `ERROR` frame before its socket is closed.
    pub async fn run(mut self) -> Result<Disconnect, SocketError> {
        let reason = loop {
            tokio::select! {
                biased;

                delivery = self.outbound_receiver.recv() => match delivery {
                    Some(frame) => self.socket.send_message(frame).await?,
                    // The manager dropped our sender when the identity was re-registered
                    None => break Disconnect::Replaced,
                },

                frame = self.socket.receive_message() => match frame? {
                    Some(frame) => {
                        self.message_handler
                            .handle_message(&self.identity, self.channel.as_deref(), frame)
                            .await;
                    }
                    None => break Disconnect::ClientClosed,
                },
            }
        };

        if reason == Disconnect::Replaced {
            self.notify_replaced().await;
        }
        let _ = self.socket.close().await;
        Ok(reason)
    }

    async fn notify_replaced(&mut self) {
        let notice = format!("{} connected elsewhere", self.identity);
        match RelayFrame::error(notice).to_json() {
            Ok(json) => {
                if let Err(e) = self.socket.send_message(json).await {
                    debug!(identity = %self.identity, error = %e, "Could not notify replaced client");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize error frame"),
        }
    }
}
