use async_trait::async_trait;
use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    http::{header::AUTHORIZATION, HeaderMap},
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection_manager::ConnectionManager;
use super::messages::{FrameType, RelayFrame};
use super::socket::{Connection, Disconnect, MessageHandler};
use crate::shared::{AppError, AppState};

/// Header carrying the identity a client connects as
pub const IDENTITY_HEADER: &str = "x-chatbus-identity";

/// Routes frames received from one client to their destination
pub struct RelayReceiveHandler {
    connection_manager: Arc<dyn ConnectionManager>,
}

impl RelayReceiveHandler {
    pub fn new(connection_manager: Arc<dyn ConnectionManager>) -> Self {
        Self { connection_manager }
    }

    async fn reply_error(&self, identity: &str, message: String) {
        debug!(identity = %identity, error = %message, "Rejecting frame");
        match RelayFrame::error(message).to_json() {
            Ok(json) => {
                self.connection_manager.send_to_member(identity, &json).await;
            }
            Err(e) => warn!(error = %e, "Failed to serialize error frame"),
        }
    }
}

#[async_trait]
impl MessageHandler for RelayReceiveHandler {
    async fn handle_message(&self, identity: &str, channel: Option<&str>, message: String) {
        let frame = match serde_json::from_str::<RelayFrame>(&message) {
            Ok(frame) => frame,
            Err(e) => {
                self.reply_error(identity, format!("Unparseable frame: {e}"))
                    .await;
                return;
            }
        };

        let outbound = match frame.delivered_from(identity).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to serialize frame");
                return;
            }
        };

        match (frame.frame_type, channel, frame.to.as_deref()) {
            (FrameType::Channel, Some(channel), _) => {
                let receivers = self
                    .connection_manager
                    .send_to_channel(channel, identity, &outbound)
                    .await;
                debug!(
                    identity = %identity,
                    channel = %channel,
                    receivers = receivers,
                    "Relayed channel frame"
                );
            }
            (FrameType::Channel, None, _) => {
                self.reply_error(identity, "Not joined to a channel".to_string())
                    .await;
            }
            (FrameType::Direct, _, Some(recipient)) => {
                if self
                    .connection_manager
                    .send_to_member(recipient, &outbound)
                    .await
                {
                    debug!(identity = %identity, recipient = %recipient, "Relayed direct frame");
                } else {
                    self.reply_error(identity, format!("Unknown recipient: {recipient}"))
                        .await;
                }
            }
            (FrameType::Direct, _, None) => {
                self.reply_error(identity, "Direct frame without recipient".to_string())
                    .await;
            }
            (FrameType::Error, _, _) => {
                debug!(identity = %identity, "Ignoring ERROR frame sent by client");
            }
        }
    }
}

/// WebSocket endpoint joining a channel
/// GET /ws/:channel with the identity in `x-chatbus-identity`
pub async fn channel_websocket_handler(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    upgrade(ws, Some(channel), &headers, app_state)
}

/// WebSocket endpoint for participants that only exchange direct frames
/// GET /ws with the identity in `x-chatbus-identity`
pub async fn direct_websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    upgrade(ws, None, &headers, app_state)
}

fn upgrade(
    ws: WebSocketUpgrade,
    channel: Option<String>,
    headers: &HeaderMap,
    app_state: AppState,
) -> Result<Response, AppError> {
    let identity = headers
        .get(IDENTITY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|identity| !identity.is_empty())
        .ok_or_else(|| {
            warn!(channel = ?channel, "Missing or invalid identity header");
            AppError::BadRequest("Missing identity".to_string())
        })?
        .to_string();

    let credentials = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value));

    if !app_state.config.accepts(credentials) {
        warn!(identity = %identity, channel = ?channel, "Rejected relay credentials");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    info!(
        identity = %identity,
        channel = ?channel,
        "Relay connection authenticated"
    );
    Ok(ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, identity, channel, app_state)
    }))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(
    socket: WebSocket,
    identity: String,
    channel: Option<String>,
    app_state: AppState,
) {
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    let connection_id = app_state
        .connection_manager
        .add_connection(identity.clone(), channel.clone(), outbound_sender)
        .await;

    let message_handler = Arc::new(RelayReceiveHandler::new(
        app_state.connection_manager.clone(),
    ));

    let connection = Connection::new(
        identity.clone(),
        channel.clone(),
        Box::new(socket),
        outbound_receiver,
        message_handler,
    );

    match connection.run().await {
        Ok(Disconnect::ClientClosed) => {
            info!(identity = %identity, channel = ?channel, "Relay connection closed cleanly");
        }
        Ok(Disconnect::Replaced) => {
            info!(identity = %identity, channel = ?channel, "Relay connection replaced");
        }
        Err(e) => {
            warn!(
                identity = %identity,
                channel = ?channel,
                error = %e,
                "Relay connection error"
            );
        }
    }

    app_state
        .connection_manager
        .remove_connection(&identity, connection_id)
        .await;
}
