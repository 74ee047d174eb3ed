use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::inbox::Inbox;
use super::{InboundHandler, Transport, TransportError};
use crate::config::TransportConfig;
use crate::relay::{FrameType, RelayFrame, IDENTITY_HEADER};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Session {
    identity: String,
    channel: Option<String>,
    sink: Mutex<SplitSink<WsStream, Message>>,
    reader: JoinHandle<()>,
}

/// Transport speaking the relay protocol over a websocket
///
/// Bodies of CHANNEL and DIRECT frames become inbound messages. ERROR
/// frames from the relay (for instance a private send to an identity that
/// is not connected) are only logged, since the relay reports them after
/// the send has already returned.
pub struct WebSocketTransport {
    relay_url: String,
    session: RwLock<Option<Arc<Session>>>,
    inbox: Inbox,
}

impl WebSocketTransport {
    /// Creates a disconnected transport for a relay at e.g. `ws://localhost:3000`
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            session: RwLock::new(None),
            inbox: Inbox::new(),
        }
    }

    fn endpoint(&self, channel: Option<&str>) -> String {
        let base = self.relay_url.trim_end_matches('/');
        match channel {
            Some(channel) => format!("{base}/ws/{channel}"),
            None => format!("{base}/ws"),
        }
    }

    async fn current_session(&self) -> Result<Arc<Session>, TransportError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)
    }

    async fn send_frame(&self, session: &Session, frame: RelayFrame) -> Result<(), TransportError> {
        let json = frame
            .to_json()
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        session
            .sink
            .lock()
            .await
            .send(Message::text(json))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(value)
        .map_err(|e| TransportError::ConnectionFailed(format!("Invalid header value: {e}")))
}

/// Forwards frame bodies from the relay into the inbox until the socket ends
async fn read_frames(
    identity: String,
    mut stream: futures::stream::SplitStream<WsStream>,
    inbox: mpsc::UnboundedSender<String>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<RelayFrame>(text.as_str()) {
                Ok(frame) if frame.frame_type == FrameType::Error => {
                    warn!(identity = %identity, error = %frame.body, "Relay rejected a frame");
                }
                Ok(frame) => {
                    if inbox.send(frame.body).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Unparseable relay frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Relay connection error");
                break;
            }
        }
    }

    debug!(identity = %identity, "Relay reader stopped");
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, config: &TransportConfig) -> Result<(), TransportError> {
        self.disconnect().await?;

        let url = self.endpoint(config.channel.as_deref());
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(IDENTITY_HEADER, header_value(&config.identity)?);
        if let Some(credentials) = &config.credentials {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {credentials}"))?);
        }

        debug!(url = %url, identity = %config.identity, "Connecting to relay");
        let (ws_stream, _) = connect_async(request).await.map_err(|e| match e {
            WsError::Http(response) if response.status() == StatusCode::UNAUTHORIZED => {
                TransportError::Unauthorized(format!("relay rejected {}", config.identity))
            }
            e => TransportError::ConnectionFailed(e.to_string()),
        })?;

        let (sink, stream) = ws_stream.split();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inbox.attach(receiver).await;

        let reader = tokio::spawn(read_frames(config.identity.clone(), stream, sender));

        *self.session.write().await = Some(Arc::new(Session {
            identity: config.identity.clone(),
            channel: config.channel.clone(),
            sink: Mutex::new(sink),
            reader,
        }));

        info!(
            url = %url,
            identity = %config.identity,
            channel = ?config.channel,
            "Connected to relay"
        );
        Ok(())
    }

    async fn send_to_channel(&self, body: String) -> Result<(), TransportError> {
        let session = self.current_session().await?;
        if session.channel.is_none() {
            return Err(TransportError::NoChannel);
        }

        self.send_frame(&session, RelayFrame::channel(body)).await
    }

    async fn send_to_recipient(
        &self,
        recipient: &str,
        body: String,
    ) -> Result<(), TransportError> {
        let session = self.current_session().await?;
        self.send_frame(&session, RelayFrame::direct(recipient.to_string(), body))
            .await
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
            if let Err(e) = session.sink.lock().await.close().await {
                debug!(identity = %session.identity, error = %e, "Relay close failed");
            }
            // Dropping the reader's sender ends any pending receive
            session.reader.abort();
            self.inbox.detach().await;
            info!(identity = %session.identity, "Disconnected from relay");
        }
        Ok(())
    }
}
