use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::inbox::Inbox;
use super::{InboundHandler, Transport, TransportError};
use crate::config::TransportConfig;

struct Member {
    session_id: Uuid,
    channel: Option<String>,
    sender: mpsc::UnboundedSender<String>,
}

/// In-process chat service shared by every participant of one process
///
/// Channel sends reach every other member of the sender's channel, private
/// sends reach exactly one identity. A newer connection for an identity
/// replaces the older one.
#[derive(Clone, Default)]
pub struct InMemoryHub {
    // identity -> member
    members: Arc<RwLock<HashMap<String, Member>>>,
    secret: Option<Arc<str>>,
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires every participant to connect with this secret
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret: String = secret.into();
        self.secret = Some(secret.into());
        self
    }

    /// Creates a disconnected transport bound to this hub
    pub fn transport(&self) -> InMemoryTransport {
        InMemoryTransport::new(self.clone())
    }

    /// Identities currently joined to a channel
    pub async fn members_of(&self, channel: &str) -> Vec<String> {
        let members = self.members.read().await;
        members
            .iter()
            .filter(|(_, member)| member.channel.as_deref() == Some(channel))
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    async fn join(
        &self,
        config: &TransportConfig,
    ) -> Result<(Uuid, mpsc::UnboundedReceiver<String>), TransportError> {
        if let Some(secret) = &self.secret {
            if config.credentials.as_deref() != Some(secret.as_ref()) {
                return Err(TransportError::Unauthorized(format!(
                    "invalid credentials for {}",
                    config.identity
                )));
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let session_id = Uuid::new_v4();

        let mut members = self.members.write().await;
        let replaced = members.insert(
            config.identity.clone(),
            Member {
                session_id,
                channel: config.channel.clone(),
                sender,
            },
        );

        if replaced.is_some() {
            warn!(identity = %config.identity, "Replacing existing hub member");
        }

        Ok((session_id, receiver))
    }

    async fn leave(&self, identity: &str, session_id: Uuid) {
        let mut members = self.members.write().await;
        if members
            .get(identity)
            .is_some_and(|member| member.session_id == session_id)
        {
            members.remove(identity);
        }
    }

    async fn send_to_channel(&self, channel: &str, from: &str, body: &str) -> usize {
        let members = self.members.read().await;
        let mut delivered = 0;
        for (identity, member) in members.iter() {
            if identity.as_str() == from || member.channel.as_deref() != Some(channel) {
                continue;
            }
            if member.sender.send(body.to_string()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    async fn send_to_member(&self, recipient: &str, body: &str) -> Result<(), TransportError> {
        let members = self.members.read().await;
        members
            .get(recipient)
            .and_then(|member| member.sender.send(body.to_string()).ok())
            .ok_or_else(|| TransportError::UnknownRecipient(recipient.to_string()))
    }
}

struct Session {
    id: Uuid,
    identity: String,
    channel: Option<String>,
}

/// Transport connected to an [`InMemoryHub`]
pub struct InMemoryTransport {
    hub: InMemoryHub,
    session: RwLock<Option<Session>>,
    inbox: Inbox,
}

impl InMemoryTransport {
    pub fn new(hub: InMemoryHub) -> Self {
        Self {
            hub,
            session: RwLock::new(None),
            inbox: Inbox::new(),
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(&self, config: &TransportConfig) -> Result<(), TransportError> {
        self.disconnect().await?;

        let (id, receiver) = self.hub.join(config).await?;
        self.inbox.attach(receiver).await;
        *self.session.write().await = Some(Session {
            id,
            identity: config.identity.clone(),
            channel: config.channel.clone(),
        });

        info!(
            identity = %config.identity,
            channel = ?config.channel,
            "Connected to in-memory hub"
        );
        Ok(())
    }

    async fn send_to_channel(&self, body: String) -> Result<(), TransportError> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or(TransportError::NotConnected)?;
        let channel = session.channel.as_deref().ok_or(TransportError::NoChannel)?;

        let receivers = self
            .hub
            .send_to_channel(channel, &session.identity, &body)
            .await;
        debug!(
            identity = %session.identity,
            channel = %channel,
            receivers = receivers,
            "Channel message sent"
        );
        Ok(())
    }

    async fn send_to_recipient(
        &self,
        recipient: &str,
        body: String,
    ) -> Result<(), TransportError> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or(TransportError::NotConnected)?;

        self.hub.send_to_member(recipient, &body).await?;
        debug!(
            identity = %session.identity,
            recipient = %recipient,
            "Private message sent"
        );
        Ok(())
    }

    async fn receive_next(&self) -> Result<Option<String>, TransportError> {
        self.inbox.next().await
    }

    async fn on_message(&self, handler: Arc<dyn InboundHandler>) -> Result<(), TransportError> {
        self.inbox.subscribe(handler).await
    }

    async fn local_identity(&self) -> Option<String> {
        let session = self.session.read().await;
        session.as_ref().map(|session| session.identity.clone())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            self.hub.leave(&session.identity, session.id).await;
            self.inbox.detach().await;
            info!(identity = %session.identity, "Disconnected from in-memory hub");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn connected(hub: &InMemoryHub, identity: &str, channel: Option<&str>) -> InMemoryTransport {
        let transport = hub.transport();
        let mut config = TransportConfig::new(identity);
        config.channel = channel.map(str::to_string);
        transport.connect(&config).await.unwrap();
        transport
    }

    #[tokio::test]
    async fn test_channel_send_skips_sender_and_other_channels() {
        let hub = InMemoryHub::new();
        let alice = connected(&hub, "alice", Some("lobby")).await;
        let bob = connected(&hub, "bob", Some("lobby")).await;
        let carol = connected(&hub, "carol", Some("kitchen")).await;

        alice.send_to_channel("hello".to_string()).await.unwrap();

        assert_eq!(bob.receive_next().await.unwrap(), Some("hello".to_string()));

        // Nothing for alice or carol: disconnecting ends their queues empty
        alice.disconnect().await.unwrap();
        carol.disconnect().await.unwrap();
        assert_eq!(alice.receive_next().await.unwrap(), None);
        assert_eq!(carol.receive_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_channel_send_without_channel_fails() {
        let hub = InMemoryHub::new();
        let alice = connected(&hub, "alice", None).await;

        let result = alice.send_to_channel("hello".to_string()).await;
        assert!(matches!(result, Err(TransportError::NoChannel)));
    }

    #[tokio::test]
    async fn test_private_send_reaches_only_recipient() {
        let hub = InMemoryHub::new();
        let alice = connected(&hub, "alice", Some("lobby")).await;
        let bob = connected(&hub, "bob", None).await;

        alice
            .send_to_recipient("bob", "psst".to_string())
            .await
            .unwrap();
        assert_eq!(bob.receive_next().await.unwrap(), Some("psst".to_string()));

        let result = alice.send_to_recipient("nobody", "psst".to_string()).await;
        assert!(matches!(result, Err(TransportError::UnknownRecipient(_))));
    }

    #[tokio::test]
    async fn test_disconnect_unblocks_pending_receive() {
        let hub = InMemoryHub::new();
        let alice = Arc::new(connected(&hub, "alice", Some("lobby")).await);

        let receiver = {
            let alice = alice.clone();
            tokio::spawn(async move { alice.receive_next().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        alice.disconnect().await.unwrap();

        let result = timeout(Duration::from_secs(1), receiver)
            .await
            .expect("receive should return after disconnect")
            .unwrap();
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disconnect_twice_is_a_no_op() {
        let hub = InMemoryHub::new();
        let alice = connected(&hub, "alice", Some("lobby")).await;

        alice.disconnect().await.unwrap();
        alice.disconnect().await.unwrap();
        assert_eq!(alice.local_identity().await, None);
        assert!(hub.members_of("lobby").await.is_empty());
    }

    #[tokio::test]
    async fn test_hub_secret_is_enforced() {
        let hub = InMemoryHub::new().with_secret("s3cret");
        let transport = hub.transport();

        let rejected = transport.connect(&TransportConfig::new("alice")).await;
        assert!(matches!(rejected, Err(TransportError::Unauthorized(_))));

        transport
            .connect(&TransportConfig::new("alice").with_credentials("s3cret"))
            .await
            .unwrap();
        assert_eq!(transport.local_identity().await, Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_replaced_member_leaving_keeps_new_session() {
        let hub = InMemoryHub::new();
        let old = connected(&hub, "alice", Some("lobby")).await;
        let _new = connected(&hub, "alice", Some("lobby")).await;

        old.disconnect().await.unwrap();
        assert_eq!(hub.members_of("lobby").await, vec!["alice".to_string()]);
    }
}
