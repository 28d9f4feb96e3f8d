//! Error types shared across the simulator crates.

use thiserror::Error;

/// Errors raised while encoding, decoding or validating OCPP material.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcppError {
    /// Frame discriminant was not 2, 3 or 4
    #[error("invalid message type id: {0}")]
    InvalidMessageTypeId(u8),

    /// Unknown CALLERROR code string on the wire
    #[error("unknown call error code: {0}")]
    UnknownErrorCode(String),

    /// JSON (de)serialization failure
    #[error("json error: {0}")]
    Json(String),

    /// Frame was well-formed JSON but violated OCPP-J framing
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl From<serde_json::Error> for OcppError {
    fn from(err: serde_json::Error) -> Self {
        OcppError::Json(err.to_string())
    }
}

pub type OcppResult<T> = Result<T, OcppError>;

/// CALLERROR codes defined by OCPP-J 1.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CallErrorCode {
    /// Requested action is not known by the receiver
    NotImplemented,
    /// Requested action is recognized but not supported
    NotSupported,
    /// An internal error prevented the receiver from processing the action
    InternalError,
    /// Payload for the action is incomplete
    ProtocolError,
    /// A security issue prevented the receiver from completing the action
    SecurityError,
    /// Payload is syntactically incorrect for the action
    FormationViolation,
    /// At least one field contains an invalid value
    PropertyConstraintViolation,
    /// At least one field violates occurrence constraints
    OccurrenceConstraintViolation,
    /// At least one field violates data type constraints
    TypeConstraintViolation,
    /// Any other error
    GenericError,
}

impl CallErrorCode {
    /// Wire representation as defined by the OCPP-J specification.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallErrorCode::NotImplemented => "NotImplemented",
            CallErrorCode::NotSupported => "NotSupported",
            CallErrorCode::InternalError => "InternalError",
            CallErrorCode::ProtocolError => "ProtocolError",
            CallErrorCode::SecurityError => "SecurityError",
            CallErrorCode::FormationViolation => "FormationViolation",
            CallErrorCode::PropertyConstraintViolation => "PropertyConstraintViolation",
            CallErrorCode::OccurrenceConstraintViolation => "OccurrenceConstraintViolation",
            CallErrorCode::TypeConstraintViolation => "TypeConstraintViolation",
            CallErrorCode::GenericError => "GenericError",
        }
    }
}

impl std::str::FromStr for CallErrorCode {
    type Err = OcppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotImplemented" => Ok(CallErrorCode::NotImplemented),
            "NotSupported" => Ok(CallErrorCode::NotSupported),
            "InternalError" => Ok(CallErrorCode::InternalError),
            "ProtocolError" => Ok(CallErrorCode::ProtocolError),
            "SecurityError" => Ok(CallErrorCode::SecurityError),
            "FormationViolation" => Ok(CallErrorCode::FormationViolation),
            "PropertyConstraintViolation" => Ok(CallErrorCode::PropertyConstraintViolation),
            "OccurrenceConstraintViolation" => Ok(CallErrorCode::OccurrenceConstraintViolation),
            "TypeConstraintViolation" => Ok(CallErrorCode::TypeConstraintViolation),
            "GenericError" => Ok(CallErrorCode::GenericError),
            other => Err(OcppError::UnknownErrorCode(other.to_string())),
        }
    }
}

impl std::fmt::Display for CallErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn call_error_code_round_trip() {
        for code in [
            CallErrorCode::NotImplemented,
            CallErrorCode::SecurityError,
            CallErrorCode::TypeConstraintViolation,
            CallErrorCode::GenericError,
        ] {
            assert_eq!(CallErrorCode::from_str(code.as_str()).unwrap(), code);
        }
    }

    #[test]
    fn unknown_error_code_is_rejected() {
        let err = CallErrorCode::from_str("Bogus").unwrap_err();
        assert_eq!(err, OcppError::UnknownErrorCode("Bogus".to_string()));
    }

    #[test]
    fn serde_uses_pascal_case() {
        let json = serde_json::to_string(&CallErrorCode::SecurityError).unwrap();
        assert_eq!(json, "\"SecurityError\"");
    }
}
