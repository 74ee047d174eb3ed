use serde_json::Value;

use super::codec::EventError;

/// An event exchanged between participants of a channel
///
/// Events are immutable once built. The type is never empty and the payload
/// is always present, although it may be `Value::Null`. Origin and
/// destination are optional: broadcast events usually carry no destination,
/// and the origin is filled in by the dispatcher from the transport identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    origin: Option<String>,
    destination: Option<String>,
    payload: Value,
}

impl Event {
    /// Creates a new event, rejecting an empty event type
    pub fn new(
        event_type: impl Into<String>,
        origin: Option<String>,
        destination: Option<String>,
        payload: Value,
    ) -> Result<Self, EventError> {
        let event_type = event_type.into();
        if event_type.is_empty() {
            return Err(EventError::invalid("event type must not be empty"));
        }

        Ok(Self {
            event_type,
            origin,
            destination,
            payload,
        })
    }

    /// Sets the origin of the event
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the destination of the event
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
