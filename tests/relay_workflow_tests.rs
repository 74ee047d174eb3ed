use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use chatbus::{
    CancellationToken, DispatchError, EventDispatcher, RelayConfig, Transport, TransportConfig,
    TransportError, WebSocketTransport,
};

mod utils;

use utils::*;

fn relay_config() -> RelayConfig {
    RelayConfig::new(SocketAddr::from(([127, 0, 0, 1], 0))).with_secret("s3cret")
}

async fn join(url: &str, identity: &str, channel: Option<&str>) -> Arc<EventDispatcher> {
    let mut config = TransportConfig::new(identity).with_credentials("s3cret");
    config.channel = channel.map(str::to_string);

    let dispatcher = EventDispatcher::connect(Arc::new(WebSocketTransport::new(url)), &config)
        .await
        .expect("relay connect should succeed");
    Arc::new(dispatcher)
}

#[tokio::test]
async fn test_broadcast_over_relay() {
    let url = spawn_relay(relay_config()).await;
    let alice = join(&url, "alice", Some("lobby")).await;
    let bob = join(&url, "bob", Some("lobby")).await;
    let carol = join(&url, "carol", Some("kitchen")).await;

    let mut bob_greets = collect_events(&bob, "greet").await;
    let mut carol_greets = collect_events(&carol, "greet").await;
    bob.run_asynchronously().await.unwrap();
    carol.run_asynchronously().await.unwrap();
    settle().await;

    alice
        .send_broadcast("greet", None, json!({"text": "hi"}))
        .await
        .unwrap();

    let event = expect_event(&mut bob_greets).await;
    assert_eq!(event.origin(), Some("alice"));
    assert_eq!(event.payload(), &json!({"text": "hi"}));
    expect_silence(&mut carol_greets).await;
}

#[tokio::test]
async fn test_private_event_over_relay_with_sync_loop() {
    let url = spawn_relay(relay_config()).await;
    let alice = join(&url, "alice", None).await;
    let bob = join(&url, "bob", Some("lobby")).await;

    let mut bob_secrets = collect_events(&bob, "secret").await;
    let bob_loop = {
        let bob = bob.clone();
        tokio::spawn(async move { bob.run_synchronously(CancellationToken::new()).await })
    };
    settle().await;

    alice
        .send_private("secret", "bob", json!("psst"))
        .await
        .unwrap();

    let event = expect_event(&mut bob_secrets).await;
    assert_eq!(event.origin(), Some("alice"));
    assert_eq!(event.destination(), Some("bob"));

    bob.close().await.unwrap();
    let result = timeout(Duration::from_secs(1), bob_loop).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_relay_rejects_wrong_credentials() {
    let url = spawn_relay(relay_config()).await;
    let transport = WebSocketTransport::new(&url);

    let result = transport
        .connect(&TransportConfig::new("mallory").with_credentials("guess"))
        .await;

    assert!(matches!(result, Err(TransportError::Unauthorized(_))));
}

#[tokio::test]
async fn test_direct_only_client_cannot_broadcast() {
    let url = spawn_relay(relay_config()).await;
    let alice = join(&url, "alice", None).await;

    let result = alice.send_broadcast("greet", None, json!(null)).await;

    assert!(matches!(
        result,
        Err(DispatchError::Transport(TransportError::NoChannel))
    ));
    alice.close().await.unwrap();
    alice.close().await.unwrap();
}
