use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{
    codec::{self, EventError},
    events::Event,
    handler::{EventListener, FnListener},
    registry::ListenerRegistry,
};
use crate::config::TransportConfig;
use crate::transport::{InboundHandler, Transport, TransportError};

/// Errors returned by the send operations
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Sends events through a transport and dispatches the ones it receives
///
/// Inbound messages are decoded into events and handed to the listener
/// registered for their type. Messages that are not events, and events
/// nobody listens for, are dropped without complaint: the channel is shared
/// with other participants and carries plenty of traffic that is not meant
/// for us.
///
/// A dispatcher runs in one of two modes, chosen once:
/// - [`EventDispatcher::run_synchronously`] occupies the calling task and
///   handles one message at a time;
/// - [`EventDispatcher::run_asynchronously`] hands a callback to the
///   transport and returns immediately.
///
/// Starting either mode a second time fails with
/// [`TransportError::AlreadySubscribed`] without touching the transport.
pub struct EventDispatcher {
    transport: Arc<dyn Transport>,
    listeners: ListenerRegistry,
    started: AtomicBool,
}

impl EventDispatcher {
    /// Create a dispatcher on top of an already connected transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            listeners: ListenerRegistry::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Connect the transport, then create a dispatcher on top of it
    pub async fn connect(
        transport: Arc<dyn Transport>,
        config: &TransportConfig,
    ) -> Result<Self, TransportError> {
        transport.connect(config).await?;
        Ok(Self::new(transport))
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub async fn local_identity(&self) -> Option<String> {
        self.transport.local_identity().await
    }

    /// Register the listener for an event type, replacing any previous one
    pub async fn register_listener(
        &self,
        event_type: impl Into<String>,
        listener: Arc<dyn EventListener>,
    ) {
        self.listeners.register(event_type, listener).await;
    }

    /// Register a closure as the listener for an event type
    pub async fn register_fn<F>(&self, event_type: impl Into<String>, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners
            .register(event_type, Arc::new(FnListener::new(callback)))
            .await;
    }

    /// Receive and dispatch messages until `shutdown` is cancelled or the
    /// transport closes, then disconnect
    ///
    /// Cancellation is checked between messages. A receive that is already
    /// waiting is not interrupted, so the loop only notices cancellation once
    /// the next message arrives or the transport is closed (for instance by
    /// calling [`EventDispatcher::close`] from another task).
    pub async fn run_synchronously(&self, shutdown: CancellationToken) -> Result<(), TransportError> {
        self.claim_mode()?;
        self.log_registered_listeners().await;

        let result = loop {
            if shutdown.is_cancelled() {
                debug!("Event loop cancelled");
                break Ok(());
            }

            match self.transport.receive_next().await {
                Ok(Some(message)) => self.handle_incoming(&message).await,
                Ok(None) => {
                    debug!("Transport closed - stopping event loop");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };

        let disconnected = self.transport.disconnect().await;
        info!("Event loop stopped");
        result.and(disconnected)
    }

    /// Have the transport deliver every future message to the listeners
    pub async fn run_asynchronously(&self) -> Result<(), TransportError> {
        self.claim_mode()?;
        self.log_registered_listeners().await;

        let handler = Arc::new(DispatchHandler {
            listeners: self.listeners.clone(),
        });
        self.transport.on_message(handler).await
    }

    /// Disconnect the transport
    pub async fn close(&self) -> Result<(), TransportError> {
        self.transport.disconnect().await
    }

    /// Decode one raw message and hand it to the matching listener
    pub async fn handle_incoming(&self, message: &str) {
        dispatch(&self.listeners, message).await;
    }

    /// Broadcast an event to the channel, stamped with our identity
    pub async fn send_broadcast(
        &self,
        event_type: &str,
        destination: Option<&str>,
        payload: Value,
    ) -> Result<(), DispatchError> {
        let event = self.build_event(event_type, destination, payload).await?;
        self.generate_event(&event).await
    }

    /// Send an event to a single recipient, stamped with our identity
    pub async fn send_private(
        &self,
        event_type: &str,
        destination: &str,
        payload: Value,
    ) -> Result<(), DispatchError> {
        let event = self
            .build_event(event_type, Some(destination), payload)
            .await?;
        self.generate_private_event(destination, &event).await
    }

    /// Broadcast a pre-built event to the channel
    pub async fn generate_event(&self, event: &Event) -> Result<(), DispatchError> {
        let body = codec::encode(event);
        self.transport.send_to_channel(body).await?;

        debug!(event_type = %event.event_type(), "Broadcast event sent");
        Ok(())
    }

    /// Send a pre-built event to a single recipient
    ///
    /// The envelope is the same as for a broadcast; only the transport
    /// primitive differs.
    pub async fn generate_private_event(
        &self,
        destination: &str,
        event: &Event,
    ) -> Result<(), DispatchError> {
        let body = codec::encode(event);
        self.transport.send_to_recipient(destination, body).await?;

        debug!(
            event_type = %event.event_type(),
            destination = %destination,
            "Private event sent"
        );
        Ok(())
    }

    async fn build_event(
        &self,
        event_type: &str,
        destination: Option<&str>,
        payload: Value,
    ) -> Result<Event, EventError> {
        let origin = self.transport.local_identity().await;
        Event::new(
            event_type,
            origin,
            destination.map(str::to_string),
            payload,
        )
    }

    fn claim_mode(&self) -> Result<(), TransportError> {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| TransportError::AlreadySubscribed)
    }

    async fn log_registered_listeners(&self) {
        let event_types = self.listeners.event_types().await;
        info!("{}", listening_line(&event_types));
    }
}

/// `Listening for events of type [ a b ]`, or `[ ]` with nothing registered
fn listening_line(event_types: &[String]) -> String {
    let mut line = String::from("Listening for events of type [ ");
    for event_type in event_types {
        line.push_str(event_type);
        line.push(' ');
    }
    line.push(']');
    line
}

/// Delivery callback handed to the transport in asynchronous mode
struct DispatchHandler {
    listeners: ListenerRegistry,
}

#[async_trait]
impl InboundHandler for DispatchHandler {
    async fn handle_inbound(&self, message: String) {
        dispatch(&self.listeners, &message).await;
    }
}

async fn dispatch(listeners: &ListenerRegistry, message: &str) {
    let event = match codec::decode(message) {
        Ok(event) => event,
        Err(e) => {
            trace!(error = %e, "Discarding message that is not an event");
            return;
        }
    };

    match listeners.lookup(event.event_type()).await {
        Some(listener) => {
            trace!(
                event_type = %event.event_type(),
                listener = listener.name(),
                "Dispatching event"
            );
            listener.process_event(&event).await;
        }
        None => {
            trace!(event_type = %event.event_type(), "No listener for event type");
        }
    }
}
