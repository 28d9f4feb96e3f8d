//! Typed dispatch for Central-System-initiated commands.

use crate::v16::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Failure to turn an action name + payload into a typed command.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid payload for {action}: {source}")]
    Payload {
        action: &'static str,
        source: serde_json::Error,
    },
}

/// A Central-System-initiated command the station knows how to handle.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingRequest {
    Reset(ResetRequest),
    ClearCache(ClearCacheRequest),
    UnlockConnector(UnlockConnectorRequest),
    GetConfiguration(GetConfigurationRequest),
    ChangeConfiguration(ChangeConfigurationRequest),
    SetChargingProfile(SetChargingProfileRequest),
    ClearChargingProfile(ClearChargingProfileRequest),
    ChangeAvailability(ChangeAvailabilityRequest),
    RemoteStartTransaction(RemoteStartTransactionRequest),
    RemoteStopTransaction(RemoteStopTransactionRequest),
    GetDiagnostics(GetDiagnosticsRequest),
    TriggerMessage(TriggerMessageRequest),
}

fn payload<T: DeserializeOwned>(action: &'static str, value: Value) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|source| ParseError::Payload { action, source })
}

impl IncomingRequest {
    /// Parse an incoming CALL into a typed command.
    pub fn parse(action: &str, value: Value) -> Result<Self, ParseError> {
        use IncomingRequest::*;
        match action {
            "Reset" => Ok(Reset(payload("Reset", value)?)),
            "ClearCache" => Ok(ClearCache(payload("ClearCache", value)?)),
            "UnlockConnector" => Ok(UnlockConnector(payload("UnlockConnector", value)?)),
            "GetConfiguration" => Ok(GetConfiguration(payload("GetConfiguration", value)?)),
            "ChangeConfiguration" => {
                Ok(ChangeConfiguration(payload("ChangeConfiguration", value)?))
            }
            "SetChargingProfile" => Ok(SetChargingProfile(payload("SetChargingProfile", value)?)),
            "ClearChargingProfile" => {
                Ok(ClearChargingProfile(payload("ClearChargingProfile", value)?))
            }
            "ChangeAvailability" => Ok(ChangeAvailability(payload("ChangeAvailability", value)?)),
            "RemoteStartTransaction" => Ok(RemoteStartTransaction(payload(
                "RemoteStartTransaction",
                value,
            )?)),
            "RemoteStopTransaction" => Ok(RemoteStopTransaction(payload(
                "RemoteStopTransaction",
                value,
            )?)),
            "GetDiagnostics" => Ok(GetDiagnostics(payload("GetDiagnostics", value)?)),
            "TriggerMessage" => Ok(TriggerMessage(payload("TriggerMessage", value)?)),
            other => Err(ParseError::UnknownAction(other.to_string())),
        }
    }

    /// Wire name of the command.
    pub fn action(&self) -> &'static str {
        use crate::OcppAction;
        match self {
            IncomingRequest::Reset(_) => ResetRequest::ACTION,
            IncomingRequest::ClearCache(_) => ClearCacheRequest::ACTION,
            IncomingRequest::UnlockConnector(_) => UnlockConnectorRequest::ACTION,
            IncomingRequest::GetConfiguration(_) => GetConfigurationRequest::ACTION,
            IncomingRequest::ChangeConfiguration(_) => ChangeConfigurationRequest::ACTION,
            IncomingRequest::SetChargingProfile(_) => SetChargingProfileRequest::ACTION,
            IncomingRequest::ClearChargingProfile(_) => ClearChargingProfileRequest::ACTION,
            IncomingRequest::ChangeAvailability(_) => ChangeAvailabilityRequest::ACTION,
            IncomingRequest::RemoteStartTransaction(_) => RemoteStartTransactionRequest::ACTION,
            IncomingRequest::RemoteStopTransaction(_) => RemoteStopTransactionRequest::ACTION,
            IncomingRequest::GetDiagnostics(_) => GetDiagnosticsRequest::ACTION,
            IncomingRequest::TriggerMessage(_) => TriggerMessageRequest::ACTION,
        }
    }
}
