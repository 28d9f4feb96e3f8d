//! OCPP-J frame envelope.
//!
//! OCPP 1.6-J messages travel as JSON arrays: `[2, id, action, payload]` for
//! a CALL, `[3, id, payload]` for a CALLRESULT and
//! `[4, id, code, description, details]` for a CALLERROR. The untagged
//! [`WireFrame`] mirrors the arrays exactly; [`Frame`] is the validated form
//! the rest of the simulator works with.

use crate::error::{CallErrorCode, OcppError, OcppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

const CALL: u8 = 2;
const CALL_RESULT: u8 = 3;
const CALL_ERROR: u8 = 4;

/// A CALLERROR received from, or destined for, the Central System.
#[derive(Debug, Clone, PartialEq)]
pub struct CallError {
    pub code: CallErrorCode,
    pub description: String,
    pub details: Value,
}

impl CallError {
    pub fn new(code: CallErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            details: Value::Object(Default::default()),
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

/// A validated OCPP-J frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call {
        message_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        message_id: String,
        payload: Value,
    },
    CallError {
        message_id: String,
        error: CallError,
    },
}

impl Frame {
    /// Build a CALL with a fresh message id.
    pub fn call(action: impl Into<String>, payload: Value) -> Self {
        Frame::Call {
            message_id: Uuid::new_v4().to_string(),
            action: action.into(),
            payload,
        }
    }

    pub fn call_result(message_id: impl Into<String>, payload: Value) -> Self {
        Frame::CallResult {
            message_id: message_id.into(),
            payload,
        }
    }

    pub fn call_error(message_id: impl Into<String>, error: CallError) -> Self {
        Frame::CallError {
            message_id: message_id.into(),
            error,
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            Frame::Call { message_id, .. }
            | Frame::CallResult { message_id, .. }
            | Frame::CallError { message_id, .. } => message_id,
        }
    }

    /// Serialize to the wire array representation.
    pub fn to_wire(&self) -> OcppResult<String> {
        let wire: WireFrame = self.clone().into();
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse a wire array into a validated frame.
    pub fn from_wire(text: &str) -> OcppResult<Self> {
        let wire: WireFrame = serde_json::from_str(text)?;
        wire.try_into()
    }
}

/// Raw array framing; tuple variants serialize to JSON arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireFrame {
    CallError(u8, String, String, String, Value),
    Call(u8, String, String, Value),
    CallResult(u8, String, Value),
}

impl From<Frame> for WireFrame {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Call {
                message_id,
                action,
                payload,
            } => WireFrame::Call(CALL, message_id, action, payload),
            Frame::CallResult {
                message_id,
                payload,
            } => WireFrame::CallResult(CALL_RESULT, message_id, payload),
            Frame::CallError { message_id, error } => WireFrame::CallError(
                CALL_ERROR,
                message_id,
                error.code.as_str().to_string(),
                error.description,
                error.details,
            ),
        }
    }
}

impl TryFrom<WireFrame> for Frame {
    type Error = OcppError;

    fn try_from(wire: WireFrame) -> OcppResult<Self> {
        match wire {
            WireFrame::Call(ty, message_id, action, payload) => {
                if ty != CALL {
                    return Err(OcppError::InvalidMessageTypeId(ty));
                }
                Ok(Frame::Call {
                    message_id,
                    action,
                    payload,
                })
            }
            WireFrame::CallResult(ty, message_id, payload) => {
                if ty != CALL_RESULT {
                    return Err(OcppError::InvalidMessageTypeId(ty));
                }
                Ok(Frame::CallResult {
                    message_id,
                    payload,
                })
            }
            WireFrame::CallError(ty, message_id, code, description, details) => {
                if ty != CALL_ERROR {
                    return Err(OcppError::InvalidMessageTypeId(ty));
                }
                Ok(Frame::CallError {
                    message_id,
                    error: CallError {
                        code: CallErrorCode::from_str(&code)?,
                        description,
                        details,
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_frame_round_trip() {
        let frame = Frame::call("Heartbeat", json!({}));
        let wire = frame.to_wire().unwrap();
        assert!(wire.starts_with("[2,"));

        let parsed = Frame::from_wire(&wire).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn call_result_wire_shape() {
        let frame = Frame::call_result("abc-1", json!({"status": "Accepted"}));
        let wire = frame.to_wire().unwrap();
        assert_eq!(wire, r#"[3,"abc-1",{"status":"Accepted"}]"#);
    }

    #[test]
    fn call_error_round_trip() {
        let frame = Frame::call_error(
            "abc-2",
            CallError::new(CallErrorCode::SecurityError, "not registered"),
        );
        let wire = frame.to_wire().unwrap();
        let parsed = Frame::from_wire(&wire).unwrap();
        match parsed {
            Frame::CallError { message_id, error } => {
                assert_eq!(message_id, "abc-2");
                assert_eq!(error.code, CallErrorCode::SecurityError);
                assert_eq!(error.description, "not registered");
            }
            other => panic!("expected CallError, got {other:?}"),
        }
    }

    #[test]
    fn parses_incoming_call_array() {
        let text = r#"[2, "77", "Reset", {"type": "Soft"}]"#;
        let frame = Frame::from_wire(text).unwrap();
        match frame {
            Frame::Call {
                message_id, action, ..
            } => {
                assert_eq!(message_id, "77");
                assert_eq!(action, "Reset");
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn bad_discriminant_is_rejected() {
        let text = r#"[5, "id", "Reset", {}]"#;
        assert!(Frame::from_wire(text).is_err());
    }
}
