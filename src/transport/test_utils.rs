use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};

use super::inbox::Inbox;
use super::{InboundHandler, Transport, TransportError};
use crate::config::TransportConfig;

/// Transport double that records what is sent and replays scripted input
pub struct MockTransport {
    identity: String,
    inbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    inbox: Inbox,
    channel_sends: RwLock<Vec<String>>,
    private_sends: RwLock<Vec<(String, String)>>,
    disconnects: AtomicUsize,
}

impl MockTransport {
    /// Creates a connected mock with the given local identity
    pub async fn new(identity: &str) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let inbox = Inbox::new();
        inbox.attach(receiver).await;

        Arc::new(Self {
            identity: identity.to_string(),
            inbound: Mutex::new(Some(sender)),
            inbox,
            channel_sends: RwLock::new(Vec::new()),
            private_sends: RwLock::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        })
    }

    /// Queues a raw inbound message
    pub async fn push_inbound(&self, message: &str) {
        if let Some(sender) = self.inbound.lock().await.as_ref() {
            let _ = sender.send(message.to_string());
        }
    }

    pub async fn channel_sends(&self) -> Vec<String> {
        self.channel_sends.read().await.clone()
    }

    pub async fn private_sends(&self) -> Vec<(String, String)> {
        self.private_sends.read().await.clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _config: &TransportConfig) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_to_channel(&self, body: String) -> Result<(), TransportError> {
        self.channel_sends.write().await.push(body);
        Ok(())
    }

    async fn send_to_recipient(
        &self,
        recipient: &str,
        body: String,
    ) -> Result<(), TransportError> {
        self.private_sends
            .write()
            .await
            .push((recipient.to_string(), body));
        Ok(())
    }

    async fn receive_next(&self) -> Result<Option<String>, TransportError> {
        self.inbox.next().await
    }

    async fn on_message(&self, handler: Arc<dyn InboundHandler>) -> Result<(), TransportError> {
        self.inbox.subscribe(handler).await
    }

    async fn local_identity(&self) -> Option<String> {
        Some(self.identity.clone())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        // Dropping the sender ends any pending receive
        self.inbound.lock().await.take();
        Ok(())
    }
}
