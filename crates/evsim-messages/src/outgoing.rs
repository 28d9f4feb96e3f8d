//! Typed representation of station-initiated requests.

use crate::v16::*;
use crate::OcppAction;
use evsim_types::OcppResult;
use serde_json::Value;

/// A request the station sends to the Central System.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingRequest {
    Authorize(AuthorizeRequest),
    BootNotification(BootNotificationRequest),
    Heartbeat(HeartbeatRequest),
    MeterValues(MeterValuesRequest),
    StartTransaction(StartTransactionRequest),
    StatusNotification(StatusNotificationRequest),
    StopTransaction(StopTransactionRequest),
    DiagnosticsStatusNotification(DiagnosticsStatusNotificationRequest),
}

impl OutgoingRequest {
    pub fn action(&self) -> &'static str {
        match self {
            OutgoingRequest::Authorize(_) => AuthorizeRequest::ACTION,
            OutgoingRequest::BootNotification(_) => BootNotificationRequest::ACTION,
            OutgoingRequest::Heartbeat(_) => HeartbeatRequest::ACTION,
            OutgoingRequest::MeterValues(_) => MeterValuesRequest::ACTION,
            OutgoingRequest::StartTransaction(_) => StartTransactionRequest::ACTION,
            OutgoingRequest::StatusNotification(_) => StatusNotificationRequest::ACTION,
            OutgoingRequest::StopTransaction(_) => StopTransactionRequest::ACTION,
            OutgoingRequest::DiagnosticsStatusNotification(_) => {
                DiagnosticsStatusNotificationRequest::ACTION
            }
        }
    }

    pub fn to_payload(&self) -> OcppResult<Value> {
        let value = match self {
            OutgoingRequest::Authorize(req) => serde_json::to_value(req)?,
            OutgoingRequest::BootNotification(req) => serde_json::to_value(req)?,
            OutgoingRequest::Heartbeat(req) => serde_json::to_value(req)?,
            OutgoingRequest::MeterValues(req) => serde_json::to_value(req)?,
            OutgoingRequest::StartTransaction(req) => serde_json::to_value(req)?,
            OutgoingRequest::StatusNotification(req) => serde_json::to_value(req)?,
            OutgoingRequest::StopTransaction(req) => serde_json::to_value(req)?,
            OutgoingRequest::DiagnosticsStatusNotification(req) => serde_json::to_value(req)?,
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_and_payload() {
        let req = OutgoingRequest::Authorize(AuthorizeRequest {
            id_tag: "TAG".to_string(),
        });
        assert_eq!(req.action(), "Authorize");
        assert_eq!(req.to_payload().unwrap()["idTag"], "TAG");
    }

    #[test]
    fn heartbeat_payload_is_empty_object() {
        let req = OutgoingRequest::Heartbeat(HeartbeatRequest::default());
        assert_eq!(req.to_payload().unwrap().to_string(), "{}");
    }
}
