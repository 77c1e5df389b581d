//! Error types for the Nexus transport.

use qnx_core::NexusError;
use reqwest::StatusCode;
use thiserror::Error;

/// Result type for transport operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur when talking to Nexus.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Websocket handshake or protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// No access token available.
    #[error("Missing Nexus access token: set NEXUS_TOKEN or log in to create ~/.qnx/auth/access_token")]
    MissingToken,

    /// API error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// A response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Build an error from a non-success HTTP status and its body.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        ClientError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}

/// Whether an HTTP status is worth retrying.
pub fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

impl From<ClientError> for NexusError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Http(ref err) => {
                if err.is_decode() {
                    NexusError::MalformedPayload(e.to_string())
                } else if let Some(status) = err.status() {
                    api_error(status.as_u16(), e.to_string())
                } else {
                    // Timeouts, connect failures, resets.
                    NexusError::Transient(e.to_string())
                }
            }
            ClientError::Json(_) | ClientError::UnexpectedResponse(_) => {
                NexusError::MalformedPayload(e.to_string())
            }
            ClientError::WebSocket(err) => websocket_error(err),
            ClientError::MissingToken => NexusError::Auth(e.to_string()),
            ClientError::ApiError { status, message } => api_error(status, message),
            ClientError::Config(msg) => NexusError::Configuration(msg),
        }
    }
}

fn api_error(status: u16, message: String) -> NexusError {
    match status {
        401 | 403 => NexusError::Unauthorized { status, message },
        404 => NexusError::NotFound(message),
        s if is_transient_status(s) => NexusError::Transient(format!("HTTP {s}: {message}")),
        _ => NexusError::Api { status, message },
    }
}

fn websocket_error(err: tokio_tungstenite::tungstenite::Error) -> NexusError {
    use tokio_tungstenite::tungstenite::Error as WsError;

    match err {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            let message = response
                .body()
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default();
            api_error(status, message)
        }
        other => NexusError::Transient(format!("WebSocket error: {other}")),
    }
}
