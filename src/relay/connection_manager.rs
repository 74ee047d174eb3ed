use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;
use uuid::Uuid;

/// Tracks live relay connections and routes outbound text to them
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Registers a connection, replacing any older one for the same identity.
    /// Returns the id of the new connection.
    async fn add_connection(
        &self,
        identity: String,
        channel: Option<String>,
        sender: mpsc::UnboundedSender<String>,
    ) -> Uuid;

    /// Removes the connection if it is still the one registered for the identity
    async fn remove_connection(&self, identity: &str, connection_id: Uuid);

    /// Sends to one identity; false if it is not connected
    async fn send_to_member(&self, identity: &str, message: &str) -> bool;

    /// Sends to every member of a channel except `from`; returns the count reached
    async fn send_to_channel(&self, channel: &str, from: &str, message: &str) -> usize;
}

struct ConnectionEntry {
    connection_id: Uuid,
    channel: Option<String>,
    sender: mpsc::UnboundedSender<String>,
}

pub struct InMemoryConnectionManager {
    // identity -> connection
    connections: Arc<RwLock<HashMap<String, ConnectionEntry>>>,
}

impl InMemoryConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn add_connection(
        &self,
        identity: String,
        channel: Option<String>,
        sender: mpsc::UnboundedSender<String>,
    ) -> Uuid {
        let connection_id = Uuid::new_v4();
        let mut connections = self.connections.write().await;
        let previous = connections.insert(
            identity.clone(),
            ConnectionEntry {
                connection_id,
                channel,
                sender,
            },
        );

        if previous.is_some() {
            warn!(identity = %identity, "Replacing existing connection");
        }
        connection_id
    }

    async fn remove_connection(&self, identity: &str, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if connections
            .get(identity)
            .is_some_and(|entry| entry.connection_id == connection_id)
        {
            connections.remove(identity);
        }
    }

    async fn send_to_member(&self, identity: &str, message: &str) -> bool {
        let connections = self.connections.read().await;
        match connections.get(identity) {
            Some(entry) => entry.sender.send(message.to_string()).is_ok(),
            None => false,
        }
    }

    async fn send_to_channel(&self, channel: &str, from: &str, message: &str) -> usize {
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for (identity, entry) in connections.iter() {
            if identity.as_str() == from || entry.channel.as_deref() != Some(channel) {
                continue;
            }
            if entry.sender.send(message.to_string()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_send_reaches_other_members_only() {
        let manager = InMemoryConnectionManager::new();
        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        let (carol_tx, mut carol_rx) = mpsc::unbounded_channel();

        manager
            .add_connection("alice".to_string(), Some("lobby".to_string()), alice_tx)
            .await;
        manager
            .add_connection("bob".to_string(), Some("lobby".to_string()), bob_tx)
            .await;
        manager.add_connection("carol".to_string(), None, carol_tx).await;

        let delivered = manager.send_to_channel("lobby", "alice", "hello").await;

        assert_eq!(delivered, 1);
        assert_eq!(bob_rx.try_recv().unwrap(), "hello");
        assert!(alice_rx.try_recv().is_err());
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_member() {
        let manager = InMemoryConnectionManager::new();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        manager.add_connection("bob".to_string(), None, bob_tx).await;

        assert!(manager.send_to_member("bob", "psst").await);
        assert!(!manager.send_to_member("nobody", "psst").await);
        assert_eq!(bob_rx.try_recv().unwrap(), "psst");
    }

    #[tokio::test]
    async fn test_stale_removal_keeps_replacement() {
        let manager = InMemoryConnectionManager::new();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();

        let old_id = manager.add_connection("bob".to_string(), None, old_tx).await;
        manager.add_connection("bob".to_string(), None, new_tx).await;
        manager.remove_connection("bob", old_id).await;

        assert!(manager.send_to_member("bob", "still here").await);
        assert_eq!(new_rx.try_recv().unwrap(), "still here");
    }
}
