use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame types exchanged with the relay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameType {
    /// Broadcast to the sender's channel
    Channel,
    /// Addressed to a single identity
    Direct,
    /// Relay -> client only: something the client sent could not be routed
    Error,
}

/// Metadata stamped by whoever builds the frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    pub timestamp: DateTime<Utc>,
}

/// One relay protocol message
///
/// The body is opaque to the relay: for the event bus it is an encoded
/// event envelope. `from` is filled in by the relay on delivery and ignored
/// when a client sets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayFrame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FrameMeta>,
}

impl RelayFrame {
    fn new(frame_type: FrameType, from: Option<String>, to: Option<String>, body: String) -> Self {
        Self {
            frame_type,
            from,
            to,
            body,
            meta: Some(FrameMeta {
                timestamp: Utc::now(),
            }),
        }
    }

    /// Create a CHANNEL frame as sent by a client
    pub fn channel(body: String) -> Self {
        Self::new(FrameType::Channel, None, None, body)
    }

    /// Create a DIRECT frame as sent by a client
    pub fn direct(to: String, body: String) -> Self {
        Self::new(FrameType::Direct, None, Some(to), body)
    }

    /// Create an ERROR frame for the relay to send back
    pub fn error(message: String) -> Self {
        Self::new(FrameType::Error, None, None, message)
    }

    /// Copy of this frame stamped with the sender, ready for delivery
    pub fn delivered_from(&self, sender: &str) -> Self {
        Self::new(
            self.frame_type,
            Some(sender.to_string()),
            self.to.clone(),
            self.body.clone(),
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
