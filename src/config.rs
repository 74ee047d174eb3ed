use std::net::SocketAddr;

/// Connection parameters handed to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Identity the participant is known by
    pub identity: String,
    /// Shared secret presented to the hub or relay
    pub credentials: Option<String>,
    /// Channel to join; without one only private sends are possible
    pub channel: Option<String>,
}

impl TransportConfig {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            credentials: None,
            channel: None,
        }
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Reads the configuration from `CHATBUS_IDENTITY`, `CHATBUS_CREDENTIALS`
    /// and `CHATBUS_CHANNEL`. Returns `None` when no identity is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let identity = var("CHATBUS_IDENTITY").filter(|s| !s.is_empty())?;

        Some(Self {
            identity,
            credentials: var("CHATBUS_CREDENTIALS"),
            channel: var("CHATBUS_CHANNEL").filter(|s| !s.is_empty()),
        })
    }
}

/// Configuration of the websocket relay server
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    /// Secret every client must present; `None` accepts anyone
    pub secret: Option<String>,
}

impl RelayConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Reads `RELAY_BIND_ADDR` (default `0.0.0.0:3000`) and `RELAY_SECRET`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = var("RELAY_BIND_ADDR")
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        Self {
            bind_addr,
            secret: var("RELAY_SECRET").filter(|s| !s.is_empty()),
        }
    }

    /// Checks a presented secret against the configured one
    pub fn accepts(&self, presented: Option<&str>) -> bool {
        match &self.secret {
            Some(secret) => presented == Some(secret.as_str()),
            None => true,
        }
    }
}
