//! Error types for the station engine.

use evsim_messages::ParseError;
use evsim_types::{CallError, CallErrorCode, ConnectorId, OcppError};
use thiserror::Error;

/// Errors raised inside the station core or surfaced by the outbound
/// adapter.
#[derive(Error, Debug)]
pub enum StationError {
    /// The transport could not carry the request
    #[error("transport error: {0}")]
    Transport(String),

    /// The socket is down and buffering was skipped for this send
    #[error("not connected and buffering skipped for {0}")]
    NotConnected(String),

    /// No paired CALLRESULT arrived in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The Central System answered with a CALLERROR
    #[error("call error from central system: {0}")]
    CallError(CallError),

    /// Response payload did not match the expected shape
    #[error("unexpected response payload for {action}: {message}")]
    UnexpectedResponse {
        action: &'static str,
        message: String,
    },

    #[error("unknown connector: {0}")]
    UnknownConnector(ConnectorId),

    #[error("a transaction is already running on connector {0}")]
    TransactionInProgress(ConnectorId),

    #[error("connector {0} is inoperative")]
    Inoperative(ConnectorId),

    #[error(transparent)]
    Ocpp(#[from] OcppError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StationError {
    fn from(err: serde_json::Error) -> Self {
        StationError::Ocpp(err.into())
    }
}

/// A command the router could not complete; becomes a CALLERROR on the wire.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {description}")]
pub struct CommandFailure {
    pub code: CallErrorCode,
    pub description: String,
}

impl CommandFailure {
    pub fn new(code: CallErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn security(description: impl Into<String>) -> Self {
        Self::new(CallErrorCode::SecurityError, description)
    }

    pub fn not_implemented(action: &str) -> Self {
        Self::new(CallErrorCode::NotImplemented, format!("unknown action: {action}"))
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(CallErrorCode::InternalError, description)
    }

    pub fn to_call_error(&self) -> CallError {
        CallError::new(self.code, self.description.clone())
    }
}

impl From<ParseError> for CommandFailure {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnknownAction(action) => CommandFailure::not_implemented(&action),
            ParseError::Payload { .. } => {
                CommandFailure::new(CallErrorCode::TypeConstraintViolation, err.to_string())
            }
        }
    }
}

impl From<StationError> for CommandFailure {
    fn from(err: StationError) -> Self {
        CommandFailure::internal(err.to_string())
    }
}
