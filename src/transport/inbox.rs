use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{InboundHandler, TransportError};

/// Queue of inbound messages shared by the transports
///
/// Messages are either pulled one at a time with [`Inbox::next`] or pushed
/// to a handler by a delivery task started with [`Inbox::subscribe`]. The
/// queue ends once every sender feeding it is dropped, which is how a
/// disconnect unblocks a pending receive.
pub(crate) struct Inbox {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    delivery: Mutex<Option<JoinHandle<()>>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self {
            receiver: Mutex::new(None),
            delivery: Mutex::new(None),
        }
    }

    /// Replaces the queue with one fed by a new connection
    pub async fn attach(&self, receiver: mpsc::UnboundedReceiver<String>) {
        *self.receiver.lock().await = Some(receiver);
    }

    /// Waits for the next message; `None` once the feeding side is gone
    ///
    /// The queue stays locked while waiting, so a `subscribe` issued meanwhile
    /// waits for this receive to complete.
    pub async fn next(&self) -> Result<Option<String>, TransportError> {
        if self.delivery.lock().await.is_some() {
            return Err(TransportError::AlreadySubscribed);
        }

        let mut receiver = self.receiver.lock().await;
        match receiver.as_mut() {
            Some(receiver) => Ok(receiver.recv().await),
            None => Err(TransportError::NotConnected),
        }
    }

    /// Spawns a task that hands every queued message to the handler in order
    pub async fn subscribe(&self, handler: Arc<dyn InboundHandler>) -> Result<(), TransportError> {
        let mut delivery = self.delivery.lock().await;
        if delivery.is_some() {
            return Err(TransportError::AlreadySubscribed);
        }

        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or(TransportError::NotConnected)?;

        *delivery = Some(tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                handler.handle_inbound(message).await;
            }
            debug!("Inbound delivery finished - queue closed");
        }));

        Ok(())
    }

    /// Forgets the delivery task; it drains what is queued and then stops
    pub async fn detach(&self) {
        self.delivery.lock().await.take();
    }
}
