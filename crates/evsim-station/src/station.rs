//! Station state and lifecycle.
//!
//! [`StationState`] is the shared state cell (connector map, configuration
//! store, registration); [`Station`] is the façade that owns the periodic
//! tasks and the ATG. The split keeps the station/ATG reference cycle out
//! of the type graph: the ATG holds the state cell, never the façade.

use crate::atg::AutomaticTransactionGenerator;
use crate::configuration::{
    ConfigurationStore, HEARTBEAT_INTERVAL_KEY, HEART_BEAT_INTERVAL_KEY,
    WEB_SOCKET_PING_INTERVAL_KEY,
};
use crate::connector::ConnectorMap;
use crate::error::StationError;
use crate::info::StationInfo;
use crate::outbound::{RequestSender, RequestSenderExt, SendOptions};
use crate::perf::PerformanceSink;
use crate::{transaction, DEFAULT_HEARTBEAT_INTERVAL_SECS, TRIGGER_MESSAGE_DELAY};
use evsim_messages::v16::{BootNotificationRequest, BootNotificationResponse};
use evsim_types::common::Reason;
use evsim_types::v16::{MessageTrigger, RegistrationStatus, ResetType};
use evsim_types::ConnectorId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Where the station stands with the Central System.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Boot was rejected
    Unregistered,
    /// Boot answered Pending; the Central System will decide later
    Pending,
    /// Boot accepted
    Registered,
    /// No boot response seen yet
    Unknown,
}

/// Shared mutable state of one simulated station.
pub struct StationState {
    info: StationInfo,
    connectors: RwLock<ConnectorMap>,
    configuration: RwLock<ConfigurationStore>,
    registration: RwLock<RegistrationState>,
    boot_response: RwLock<Option<BootNotificationResponse>>,
    meter_tasks: Mutex<HashMap<ConnectorId, JoinHandle<()>>>,
}

impl StationState {
    pub fn new(info: StationInfo) -> Self {
        let connectors = ConnectorMap::new(info.connector_count);
        let configuration = ConfigurationStore::for_station(&info);
        Self {
            info,
            connectors: RwLock::new(connectors),
            configuration: RwLock::new(configuration),
            registration: RwLock::new(RegistrationState::Unknown),
            boot_response: RwLock::new(None),
            meter_tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn info(&self) -> &StationInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.charging_station_id
    }

    pub fn connectors(&self) -> &RwLock<ConnectorMap> {
        &self.connectors
    }

    pub fn configuration(&self) -> &RwLock<ConfigurationStore> {
        &self.configuration
    }

    pub async fn registration(&self) -> RegistrationState {
        *self.registration.read().await
    }

    pub async fn set_registration(&self, state: RegistrationState) {
        *self.registration.write().await = state;
    }

    pub async fn is_registered(&self) -> bool {
        self.registration().await == RegistrationState::Registered
    }

    pub async fn boot_response(&self) -> Option<BootNotificationResponse> {
        self.boot_response.read().await.clone()
    }

    pub async fn set_boot_response(&self, response: Option<BootNotificationResponse>) {
        *self.boot_response.write().await = response;
    }

    /// Station-level availability, dominated by connector 0.
    pub async fn station_available(&self) -> bool {
        self.connectors.read().await.station_available()
    }

    pub(crate) async fn remember_meter_task(&self, connector_id: ConnectorId, task: JoinHandle<()>) {
        if let Some(old) = self.meter_tasks.lock().await.insert(connector_id, task) {
            old.abort();
        }
    }

    pub(crate) async fn abort_meter_task(&self, connector_id: ConnectorId) {
        if let Some(task) = self.meter_tasks.lock().await.remove(&connector_id) {
            task.abort();
        }
    }

    async fn abort_all_meter_tasks(&self) {
        for (_, task) in self.meter_tasks.lock().await.drain() {
            task.abort();
        }
    }
}

/// One simulated charging station.
pub struct Station {
    state: Arc<StationState>,
    sender: Arc<dyn RequestSender>,
    atg: Arc<AutomaticTransactionGenerator>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    heartbeat_restarts: AtomicU64,
    boot_task: Mutex<Option<JoinHandle<()>>>,
}

impl Station {
    pub fn new(
        info: StationInfo,
        sender: Arc<dyn RequestSender>,
        perf: Arc<dyn PerformanceSink>,
    ) -> Arc<Self> {
        let atg_config = info.automatic_transaction_generator.clone().unwrap_or_default();
        let state = Arc::new(StationState::new(info));
        let atg = AutomaticTransactionGenerator::new(
            Arc::clone(&state),
            Arc::clone(&sender),
            perf,
            atg_config,
        );
        Arc::new(Self {
            state,
            sender,
            atg,
            heartbeat: Mutex::new(None),
            heartbeat_restarts: AtomicU64::new(0),
            boot_task: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        self.state.id()
    }

    pub fn state(&self) -> &Arc<StationState> {
        &self.state
    }

    pub fn sender(&self) -> &Arc<dyn RequestSender> {
        &self.sender
    }

    pub fn atg(&self) -> &Arc<AutomaticTransactionGenerator> {
        &self.atg
    }

    fn boot_request(&self) -> BootNotificationRequest {
        let info = self.state.info();
        BootNotificationRequest {
            charge_point_vendor: info.charge_point_vendor.clone(),
            charge_point_model: info.charge_point_model.clone(),
            charge_point_serial_number: Some(info.charging_station_id.clone()),
            firmware_version: info.firmware_version.clone(),
        }
    }

    /// Begin the boot sequence; retries until the Central System accepts.
    pub async fn start(self: &Arc<Self>) {
        let station = Arc::clone(self);
        let task = tokio::spawn(async move {
            station.boot_loop().await;
        });
        if let Some(old) = self.boot_task.lock().await.replace(task) {
            old.abort();
        }
    }

    async fn boot_loop(self: &Arc<Self>) {
        loop {
            let retry = match self
                .sender
                .send_boot_notification(self.boot_request(), SendOptions::default())
                .await
            {
                Ok(response) => {
                    let interval = response.interval.max(0) as u64;
                    let status = response.status;
                    self.state.set_boot_response(Some(response)).await;
                    match status {
                        RegistrationStatus::Accepted => {
                            info!(station = self.id(), "registered with central system");
                            self.state.set_registration(RegistrationState::Registered).await;
                            self.adopt_heartbeat_interval(interval).await;
                            self.restart_heartbeat().await;
                            self.restart_ws_ping().await;
                            self.notify_all_statuses().await;
                            if self.atg.config().enable {
                                self.atg.start().await;
                            }
                            return;
                        }
                        RegistrationStatus::Pending => {
                            self.state.set_registration(RegistrationState::Pending).await;
                            interval.max(1)
                        }
                        RegistrationStatus::Rejected => {
                            warn!(station = self.id(), "boot notification rejected");
                            self.state
                                .set_registration(RegistrationState::Unregistered)
                                .await;
                            interval.max(1)
                        }
                    }
                }
                Err(err) => {
                    warn!(station = self.id(), error = %err, "boot notification failed");
                    DEFAULT_HEARTBEAT_INTERVAL_SECS
                }
            };
            sleep(Duration::from_secs(retry)).await;
        }
    }

    async fn adopt_heartbeat_interval(&self, interval_secs: u64) {
        if interval_secs == 0 {
            return;
        }
        let mut configuration = self.state.configuration().write().await;
        let value = interval_secs.to_string();
        configuration.set(HEARTBEAT_INTERVAL_KEY, &value, false);
        configuration.set(HEART_BEAT_INTERVAL_KEY, &value, false);
    }

    async fn notify_all_statuses(&self) {
        let statuses: Vec<_> = {
            let connectors = self.state.connectors().read().await;
            connectors
                .ids()
                .filter_map(|id| connectors.lookup(id).map(|c| (id, c.status())))
                .collect()
        };
        for (id, status) in statuses {
            if let Err(err) = self
                .sender
                .send_status_notification(id, status, SendOptions::default())
                .await
            {
                warn!(station = self.id(), connector = id, error = %err, "status notification failed");
            }
        }
    }

    /// Stop periodic work and close out every running transaction.
    pub async fn stop(&self, reason: Option<Reason>) {
        if let Some(task) = self.boot_task.lock().await.take() {
            task.abort();
        }
        self.atg.stop(reason).await;

        let remaining: Vec<ConnectorId> = {
            let connectors = self.state.connectors().read().await;
            connectors
                .connector_ids()
                .filter(|id| {
                    connectors
                        .lookup(*id)
                        .map(|c| c.transaction_started())
                        .unwrap_or(false)
                })
                .collect()
        };
        for connector_id in remaining {
            if let Err(err) =
                transaction::stop_transaction(&self.state, &self.sender, connector_id, reason).await
            {
                warn!(station = self.id(), connector = connector_id, error = %err, "stop on shutdown failed");
            }
        }

        if let Some(task) = self.heartbeat.lock().await.take() {
            task.abort();
        }
        self.state.abort_all_meter_tasks().await;
        self.sender.restart_ping(Duration::ZERO);
        self.state.set_boot_response(None).await;
        self.state.set_registration(RegistrationState::Unknown).await;
        info!(station = self.id(), "station stopped");
    }

    /// Asynchronous reset: teardown, simulated down-time, re-boot. Returns
    /// immediately.
    pub fn schedule_reset(self: &Arc<Self>, reset_type: ResetType) {
        let reason = match reset_type {
            ResetType::Hard => Reason::HardReset,
            ResetType::Soft => Reason::SoftReset,
        };
        let down_time = Duration::from_secs(self.state.info().reset_time_secs);
        let station = Arc::clone(self);
        tokio::spawn(async move {
            info!(station = station.id(), ?reset_type, "resetting station");
            station.stop(Some(reason)).await;
            sleep(down_time).await;
            station.start().await;
        });
    }

    /// (Re)spawn the heartbeat task from the configured interval.
    pub async fn restart_heartbeat(&self) {
        let interval_secs = self
            .state
            .configuration()
            .read()
            .await
            .interval_secs(HEARTBEAT_INTERVAL_KEY)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECS);

        let mut slot = self.heartbeat.lock().await;
        if let Some(old) = slot.take() {
            old.abort();
        }
        self.heartbeat_restarts.fetch_add(1, Ordering::Relaxed);
        if interval_secs == 0 {
            debug!(station = self.id(), "heartbeat disabled");
            return;
        }

        let sender = Arc::clone(&self.sender);
        let station_id = self.id().to_string();
        *slot = Some(tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(interval_secs)).await;
                if let Err(err) = sender.send_heartbeat(SendOptions::default()).await {
                    warn!(station = %station_id, error = %err, "heartbeat failed");
                }
            }
        }));
    }

    /// How many times the heartbeat task has been (re)started.
    pub fn heartbeat_restart_count(&self) -> u64 {
        self.heartbeat_restarts.load(Ordering::Relaxed)
    }

    /// Push the configured WebSocket ping cadence down to the transport.
    pub async fn restart_ws_ping(&self) {
        let interval_secs = self
            .state
            .configuration()
            .read()
            .await
            .interval_secs(WEB_SOCKET_PING_INTERVAL_KEY)
            .unwrap_or(0);
        self.sender.restart_ping(Duration::from_secs(interval_secs));
    }

    /// Fire a Central-System-requested message after the trigger delay.
    pub(crate) fn schedule_triggered(
        self: &Arc<Self>,
        trigger: MessageTrigger,
        connector_id: Option<ConnectorId>,
    ) {
        let station = Arc::clone(self);
        tokio::spawn(async move {
            sleep(TRIGGER_MESSAGE_DELAY).await;
            if let Err(err) = station.send_triggered(trigger, connector_id).await {
                error!(station = station.id(), ?trigger, error = %err, "triggered send failed");
            }
        });
    }

    async fn send_triggered(
        &self,
        trigger: MessageTrigger,
        connector_id: Option<ConnectorId>,
    ) -> Result<(), StationError> {
        match trigger {
            MessageTrigger::BootNotification => {
                let response = self
                    .sender
                    .send_boot_notification(self.boot_request(), SendOptions::triggered())
                    .await?;
                self.state.set_boot_response(Some(response)).await;
            }
            MessageTrigger::Heartbeat => {
                self.sender.send_heartbeat(SendOptions::triggered()).await?;
            }
            MessageTrigger::StatusNotification => {
                let targets: Vec<_> = {
                    let connectors = self.state.connectors().read().await;
                    match connector_id {
                        Some(id) => connectors
                            .lookup(id)
                            .map(|c| vec![(id, c.status())])
                            .unwrap_or_default(),
                        None => connectors
                            .ids()
                            .filter_map(|id| connectors.lookup(id).map(|c| (id, c.status())))
                            .collect(),
                    }
                };
                for (id, status) in targets {
                    self.sender
                        .send_status_notification(id, status, SendOptions::triggered())
                        .await?;
                }
            }
            other => {
                debug!(station = self.id(), ?other, "trigger not supported");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::HEARTBEAT_INTERVAL_KEY;
    use crate::info::AtgConfig;
    use crate::testing::{registered_station, ScriptedSender};
    use crate::transaction;
    use crate::{NoopPerformanceSink, StationInfo};

    async fn fresh_station(info: StationInfo) -> (Arc<Station>, Arc<ScriptedSender>) {
        let sender = ScriptedSender::new();
        let station = Station::new(
            info,
            sender.clone() as Arc<dyn RequestSender>,
            Arc::new(NoopPerformanceSink),
        );
        (station, sender)
    }

    #[tokio::test]
    async fn boot_registers_and_brings_the_station_up() {
        let (station, sender) = fresh_station(StationInfo::default()).await;

        station.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            station.state().registration().await,
            RegistrationState::Registered
        );
        assert_eq!(sender.count_action("BootNotification"), 1);
        // connector 0 plus the two physical connectors
        assert_eq!(sender.count_action("StatusNotification"), 3);
        assert_eq!(station.heartbeat_restart_count(), 1);

        // the assigned interval lands in both alias keys
        let configuration = station.state().configuration().read().await;
        assert_eq!(configuration.get(HEARTBEAT_INTERVAL_KEY).unwrap().value, "300");
        assert_eq!(
            configuration.get(HEART_BEAT_INTERVAL_KEY).unwrap().value,
            "300"
        );
    }

    #[tokio::test]
    async fn pending_boot_leaves_station_gated() {
        let (station, sender) = fresh_station(StationInfo::default()).await;
        *sender.boot_status.lock().unwrap() = evsim_types::v16::RegistrationStatus::Pending;

        station.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            station.state().registration().await,
            RegistrationState::Pending
        );
        assert_eq!(sender.count_action("StatusNotification"), 0);
    }

    #[tokio::test]
    async fn boot_starts_the_generator_when_enabled() {
        let mut info = StationInfo::default();
        info.automatic_transaction_generator = Some(AtgConfig {
            enable: true,
            probability_of_start: 0.0,
            min_delay_between_two_transactions: 60.0,
            max_delay_between_two_transactions: 120.0,
            ..AtgConfig::default()
        });
        let (station, _sender) = fresh_station(info).await;

        station.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(station.atg().running());
        station.stop(None).await;
        assert!(!station.atg().running());
    }

    #[tokio::test]
    async fn stop_closes_running_transactions_and_clears_registration() {
        let (station, sender) = registered_station(StationInfo::default()).await;
        transaction::start_transaction(station.state(), station.sender(), 1, Some("T".into()))
            .await
            .unwrap();

        station.stop(Some(Reason::Local)).await;

        assert_eq!(sender.count_action("StopTransaction"), 1);
        assert_eq!(
            station.state().registration().await,
            RegistrationState::Unknown
        );
        assert!(station.state().boot_response().await.is_none());
        // ping task torn down
        assert_eq!(sender.ping_intervals().last(), Some(&Duration::ZERO));
    }

    #[tokio::test]
    async fn restart_heartbeat_counts_restarts() {
        let (station, _sender) = registered_station(StationInfo::default()).await;
        station.restart_heartbeat().await;
        station.restart_heartbeat().await;
        assert_eq!(station.heartbeat_restart_count(), 2);
    }
}
