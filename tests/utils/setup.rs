#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatbus::{relay, AppState, EventDispatcher, InMemoryHub, RelayConfig, TransportConfig};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// In-memory hub with a default channel for participants to join
pub struct TestHub {
    pub hub: InMemoryHub,
    channel: String,
}

impl TestHub {
    pub fn new() -> Self {
        Self {
            hub: InMemoryHub::new(),
            channel: "lobby".to_string(),
        }
    }

    /// Connects a participant to the hub's channel
    pub async fn join(&self, identity: &str) -> Arc<EventDispatcher> {
        let config = TransportConfig::new(identity).with_channel(&self.channel);
        let dispatcher = EventDispatcher::connect(Arc::new(self.hub.transport()), &config)
            .await
            .expect("in-memory connect should succeed");
        Arc::new(dispatcher)
    }

    /// Connects a participant that only takes part in private exchanges
    pub async fn join_without_channel(&self, identity: &str) -> Arc<EventDispatcher> {
        let config = TransportConfig::new(identity);
        let dispatcher = EventDispatcher::connect(Arc::new(self.hub.transport()), &config)
            .await
            .expect("in-memory connect should succeed");
        Arc::new(dispatcher)
    }
}

/// Starts a relay on an ephemeral port and returns its websocket base URL
pub async fn spawn_relay(config: RelayConfig) -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind relay listener");
    let addr = listener.local_addr().expect("relay local addr");

    let app = relay::router(AppState::in_memory(config));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("relay server");
    });

    format!("ws://{addr}")
}

/// Gives the relay a moment to register freshly upgraded connections
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
