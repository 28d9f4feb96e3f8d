//! Outbound request adapter contract.
//!
//! The only egress the core knows about. The WebSocket transport implements
//! [`RequestSender`]; tests substitute a scripted recorder. The typed
//! helpers on [`RequestSenderExt`] wrap the raw payload exchange so handler
//! and ATG code stays shape-safe.

use crate::error::StationError;
use async_trait::async_trait;
use chrono::Utc;
use evsim_messages::v16::{
    AuthorizeRequest, AuthorizeResponse, BootNotificationRequest, BootNotificationResponse,
    DiagnosticsStatusNotificationRequest, HeartbeatRequest, HeartbeatResponse, MeterValuesRequest,
    MeterValuesResponse, StartTransactionRequest, StartTransactionResponse,
    StatusNotificationRequest, StatusNotificationResponse, StopTransactionRequest,
    StopTransactionResponse,
};
use evsim_messages::OutgoingRequest;
use evsim_types::common::{MeterValue, Reason};
use evsim_types::v16::{ChargePointErrorCode, ChargePointStatus, DiagnosticsStatus};
use evsim_types::{ConnectorId, IdToken, TransactionId};
use serde_json::Value;
use std::time::Duration;

/// Per-send options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Drop the send instead of queueing it when the socket is down
    pub skip_buffering_on_error: bool,
    /// One-shot send for TriggerMessage responses; bypasses buffering and
    /// retry gating
    pub trigger_message: bool,
}

impl SendOptions {
    pub fn triggered() -> Self {
        Self {
            skip_buffering_on_error: true,
            trigger_message: true,
        }
    }
}

/// Uniform interface the core uses to reach the Central System.
#[async_trait]
pub trait RequestSender: Send + Sync {
    /// Send a CALL and block until the paired CALLRESULT, a CALLERROR, or
    /// the transport's error classification.
    async fn send_request(
        &self,
        request: OutgoingRequest,
        options: SendOptions,
    ) -> Result<Value, StationError>;

    /// Emit a CALLRESULT answering an incoming CALL.
    async fn send_response(
        &self,
        message_id: &str,
        payload: Value,
        action: &str,
    ) -> Result<(), StationError>;

    /// Whether the adapter can currently carry requests.
    fn ready(&self) -> bool;

    /// Restart the transport-level WebSocket ping task. Zero disables it.
    fn restart_ping(&self, interval: Duration);
}

fn decode<T: serde::de::DeserializeOwned>(
    action: &'static str,
    value: Value,
) -> Result<T, StationError> {
    serde_json::from_value(value).map_err(|err| StationError::UnexpectedResponse {
        action,
        message: err.to_string(),
    })
}

/// Typed request helpers shared by handlers, ATG and station lifecycle.
#[async_trait]
pub trait RequestSenderExt: RequestSender {
    async fn send_authorize(&self, id_tag: IdToken) -> Result<AuthorizeResponse, StationError> {
        let payload = self
            .send_request(
                OutgoingRequest::Authorize(AuthorizeRequest { id_tag }),
                SendOptions::default(),
            )
            .await?;
        decode("Authorize", payload)
    }

    async fn send_boot_notification(
        &self,
        request: BootNotificationRequest,
        options: SendOptions,
    ) -> Result<BootNotificationResponse, StationError> {
        let payload = self
            .send_request(OutgoingRequest::BootNotification(request), options)
            .await?;
        decode("BootNotification", payload)
    }

    async fn send_heartbeat(&self, options: SendOptions) -> Result<HeartbeatResponse, StationError> {
        let payload = self
            .send_request(OutgoingRequest::Heartbeat(HeartbeatRequest::default()), options)
            .await?;
        decode("Heartbeat", payload)
    }

    async fn send_start_transaction(
        &self,
        connector_id: ConnectorId,
        id_tag: Option<IdToken>,
        meter_start: i32,
    ) -> Result<StartTransactionResponse, StationError> {
        let payload = self
            .send_request(
                OutgoingRequest::StartTransaction(StartTransactionRequest {
                    connector_id,
                    id_tag,
                    meter_start,
                    timestamp: Utc::now(),
                }),
                SendOptions::default(),
            )
            .await?;
        decode("StartTransaction", payload)
    }

    async fn send_stop_transaction(
        &self,
        transaction_id: TransactionId,
        meter_stop: i32,
        id_tag: Option<IdToken>,
        reason: Option<Reason>,
    ) -> Result<StopTransactionResponse, StationError> {
        let payload = self
            .send_request(
                OutgoingRequest::StopTransaction(StopTransactionRequest {
                    transaction_id,
                    meter_stop,
                    timestamp: Utc::now(),
                    id_tag,
                    reason,
                    transaction_data: None,
                }),
                SendOptions::default(),
            )
            .await?;
        decode("StopTransaction", payload)
    }

    async fn send_status_notification(
        &self,
        connector_id: ConnectorId,
        status: ChargePointStatus,
        options: SendOptions,
    ) -> Result<StatusNotificationResponse, StationError> {
        let payload = self
            .send_request(
                OutgoingRequest::StatusNotification(StatusNotificationRequest {
                    connector_id,
                    error_code: ChargePointErrorCode::NoError,
                    status,
                    timestamp: Some(Utc::now()),
                    info: None,
                }),
                options,
            )
            .await?;
        decode("StatusNotification", payload)
    }

    async fn send_meter_values(
        &self,
        connector_id: ConnectorId,
        transaction_id: Option<TransactionId>,
        meter_value: Vec<MeterValue>,
    ) -> Result<MeterValuesResponse, StationError> {
        let payload = self
            .send_request(
                OutgoingRequest::MeterValues(MeterValuesRequest {
                    connector_id,
                    transaction_id,
                    meter_value,
                }),
                SendOptions::default(),
            )
            .await?;
        decode("MeterValues", payload)
    }

    async fn send_diagnostics_status(
        &self,
        status: DiagnosticsStatus,
    ) -> Result<(), StationError> {
        self.send_request(
            OutgoingRequest::DiagnosticsStatusNotification(DiagnosticsStatusNotificationRequest {
                status,
            }),
            SendOptions::default(),
        )
        .await?;
        Ok(())
    }
}

impl<T: RequestSender + ?Sized> RequestSenderExt for T {}
