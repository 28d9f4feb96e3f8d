//! Transport error classification.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("websocket connect failed: {0}")]
    Connect(String),

    #[error("connection closed")]
    Closed,

    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::Connect(err.to_string())
    }
}
