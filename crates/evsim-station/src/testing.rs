//! Test doubles: a scripted, recording outbound adapter.

use crate::error::StationError;
use crate::info::StationInfo;
use crate::outbound::{RequestSender, SendOptions};
use crate::perf::NoopPerformanceSink;
use crate::station::Station;
use async_trait::async_trait;
use chrono::Utc;
use evsim_messages::v16::{
    AuthorizeResponse, BootNotificationResponse, HeartbeatResponse, StartTransactionResponse,
    StopTransactionResponse,
};
use evsim_messages::OutgoingRequest;
use evsim_types::common::{AuthorizationStatus, IdTagInfo};
use evsim_types::v16::RegistrationStatus;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn id_tag_info(status: AuthorizationStatus) -> IdTagInfo {
    IdTagInfo {
        status,
        parent_id_tag: None,
        expiry_date: None,
    }
}

/// Outbound adapter that answers from a script and records everything.
pub(crate) struct ScriptedSender {
    sent: Mutex<Vec<OutgoingRequest>>,
    responses: Mutex<Vec<(String, Value, String)>>,
    ping_intervals: Mutex<Vec<Duration>>,
    pub authorize_status: Mutex<AuthorizationStatus>,
    pub start_status: Mutex<AuthorizationStatus>,
    pub stop_status: Mutex<AuthorizationStatus>,
    pub boot_status: Mutex<RegistrationStatus>,
    next_transaction_id: AtomicI32,
    pub is_ready: AtomicBool,
}

impl ScriptedSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            ping_intervals: Mutex::new(Vec::new()),
            authorize_status: Mutex::new(AuthorizationStatus::Accepted),
            start_status: Mutex::new(AuthorizationStatus::Accepted),
            stop_status: Mutex::new(AuthorizationStatus::Accepted),
            boot_status: Mutex::new(RegistrationStatus::Accepted),
            next_transaction_id: AtomicI32::new(1),
            is_ready: AtomicBool::new(true),
        })
    }

    pub fn sent(&self) -> Vec<OutgoingRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_actions(&self) -> Vec<&'static str> {
        self.sent().iter().map(OutgoingRequest::action).collect()
    }

    pub fn count_action(&self, action: &str) -> usize {
        self.sent_actions()
            .into_iter()
            .filter(|sent| *sent == action)
            .count()
    }

    pub fn responses(&self) -> Vec<(String, Value, String)> {
        self.responses.lock().unwrap().clone()
    }

    pub fn ping_intervals(&self) -> Vec<Duration> {
        self.ping_intervals.lock().unwrap().clone()
    }

    pub fn set_authorize_status(&self, status: AuthorizationStatus) {
        *self.authorize_status.lock().unwrap() = status;
    }

    pub fn set_start_status(&self, status: AuthorizationStatus) {
        *self.start_status.lock().unwrap() = status;
    }

    pub fn set_stop_status(&self, status: AuthorizationStatus) {
        *self.stop_status.lock().unwrap() = status;
    }
}

#[async_trait]
impl RequestSender for ScriptedSender {
    async fn send_request(
        &self,
        request: OutgoingRequest,
        _options: SendOptions,
    ) -> Result<Value, StationError> {
        let response = match &request {
            OutgoingRequest::Authorize(_) => serde_json::to_value(AuthorizeResponse {
                id_tag_info: id_tag_info(*self.authorize_status.lock().unwrap()),
            })?,
            OutgoingRequest::BootNotification(_) => {
                serde_json::to_value(BootNotificationResponse {
                    current_time: Utc::now(),
                    interval: 300,
                    status: *self.boot_status.lock().unwrap(),
                })?
            }
            OutgoingRequest::Heartbeat(_) => serde_json::to_value(HeartbeatResponse {
                current_time: Utc::now(),
            })?,
            OutgoingRequest::StartTransaction(_) => {
                serde_json::to_value(StartTransactionResponse {
                    id_tag_info: id_tag_info(*self.start_status.lock().unwrap()),
                    transaction_id: self.next_transaction_id.fetch_add(1, Ordering::SeqCst),
                })?
            }
            OutgoingRequest::StopTransaction(_) => serde_json::to_value(StopTransactionResponse {
                id_tag_info: Some(id_tag_info(*self.stop_status.lock().unwrap())),
            })?,
            OutgoingRequest::MeterValues(_)
            | OutgoingRequest::StatusNotification(_)
            | OutgoingRequest::DiagnosticsStatusNotification(_) => {
                Value::Object(Default::default())
            }
        };
        self.sent.lock().unwrap().push(request);
        Ok(response)
    }

    async fn send_response(
        &self,
        message_id: &str,
        payload: Value,
        action: &str,
    ) -> Result<(), StationError> {
        self.responses
            .lock()
            .unwrap()
            .push((message_id.to_string(), payload, action.to_string()));
        Ok(())
    }

    fn ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    fn restart_ping(&self, interval: Duration) {
        self.ping_intervals.lock().unwrap().push(interval);
    }
}

/// A station wired to a scripted sender, registered and ready.
pub(crate) async fn registered_station(info: StationInfo) -> (Arc<Station>, Arc<ScriptedSender>) {
    let sender = ScriptedSender::new();
    let station = Station::new(
        info,
        sender.clone() as Arc<dyn RequestSender>,
        Arc::new(NoopPerformanceSink),
    );
    station
        .state()
        .set_registration(crate::station::RegistrationState::Registered)
        .await;
    (station, sender)
}
