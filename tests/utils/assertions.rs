//! Test assertion helpers for observing dispatched events
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use chatbus::{Event, EventDispatcher};

/// Registers a listener that forwards every event of `event_type` into a channel
pub async fn collect_events(
    dispatcher: &EventDispatcher,
    event_type: &str,
) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    dispatcher
        .register_fn(event_type, move |event| {
            let _ = tx.send(event.clone());
        })
        .await;
    rx
}

/// Waits for the next collected event, failing the test after a second
pub async fn expect_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event listener was dropped")
}

/// Asserts that nothing arrives for a short while
pub async fn expect_silence(events: &mut mpsc::UnboundedReceiver<Event>) {
    let result = timeout(Duration::from_millis(100), events.recv()).await;
    assert!(result.is_err(), "expected no event, got {:?}", result);
}
