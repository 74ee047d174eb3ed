use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::RelayConfig;
use crate::relay::{ConnectionManager, InMemoryConnectionManager};

/// Shared relay state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub connection_manager: Arc<dyn ConnectionManager>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(connection_manager: Arc<dyn ConnectionManager>, config: RelayConfig) -> Self {
        Self {
            connection_manager,
            config: Arc::new(config),
        }
    }

    /// State backed by the in-memory connection manager
    pub fn in_memory(config: RelayConfig) -> Self {
        Self::new(Arc::new(InMemoryConnectionManager::new()), config)
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
