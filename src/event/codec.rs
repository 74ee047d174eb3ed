//! Envelope codec
//!
//! Converts events to and from the JSON envelope exchanged on the wire:
//!
//! ```text
//! { "event": "greet", "origin": "alice", "destination": "bob", "payload": {...} }
//! ```
//!
//! Only `event` and `payload` are load-bearing on decode. Unknown keys are
//! ignored, and `origin`/`destination` are dropped when they are missing or
//! not strings.

use serde_json::Value;
use thiserror::Error;

use super::events::Event;

/// Errors produced while turning raw text into an event
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

impl EventError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EventError::InvalidEvent(msg.into())
    }
}

/// Serializes an event into its JSON envelope
///
/// Keys are written in the order `event`, `origin`, `destination`, `payload`.
/// Every field is written through `Value`'s `Display`, which escapes strings
/// and cannot fail.
pub fn encode(event: &Event) -> String {
    let mut envelope = format!("{{\"event\":{}", Value::from(event.event_type()));
    if let Some(origin) = event.origin() {
        envelope.push_str(&format!(",\"origin\":{}", Value::from(origin)));
    }
    if let Some(destination) = event.destination() {
        envelope.push_str(&format!(",\"destination\":{}", Value::from(destination)));
    }
    envelope.push_str(&format!(",\"payload\":{}}}", event.payload()));
    envelope
}

/// Parses a JSON envelope into an event
pub fn decode(raw: &str) -> Result<Event, EventError> {
    let json: Value = serde_json::from_str(raw)?;

    let event_type = json
        .get("event")
        .and_then(Value::as_str)
        .filter(|event_type| !event_type.is_empty())
        .ok_or_else(|| EventError::invalid("missing or empty `event` field"))?;

    let payload = json
        .get("payload")
        .cloned()
        .ok_or_else(|| EventError::invalid("missing `payload` field"))?;

    let origin = json.get("origin").and_then(Value::as_str).map(str::to_string);
    let destination = json
        .get("destination")
        .and_then(Value::as_str)
        .map(str::to_string);

    Event::new(event_type, origin, destination, payload)
}
