//! Automatic transaction generator.
//!
//! One instance per station. `start()` spawns an independent driver task
//! per physical connector so a slow connector never starves the others;
//! each driver sleeps a random idle interval, draws the start probability
//! from a CryptoRng and runs a full transaction when the draw hits.
//! `stop()` is cooperative: it closes running transactions, raises the stop
//! flag and lets the drivers exit at their next predicate check.

use crate::error::StationError;
use crate::info::AtgConfig;
use crate::outbound::{RequestSender, RequestSenderExt};
use crate::perf::PerformanceSink;
use crate::station::StationState;
use crate::transaction;
use crate::{ATG_INIT_TIME, ATG_WAIT_TIME};
use chrono::{DateTime, Utc};
use evsim_types::common::Reason;
use evsim_types::{ConnectorId, IdToken};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone)]
struct AtgRuntime {
    started_at: Option<DateTime<Utc>>,
    start_instant: Option<Instant>,
    stop_instant: Option<Instant>,
    running_duration: Duration,
}

/// Randomized per-connector transaction driver.
pub struct AutomaticTransactionGenerator {
    state: Arc<StationState>,
    sender: Arc<dyn RequestSender>,
    perf: Arc<dyn PerformanceSink>,
    config: AtgConfig,
    time_to_stop: AtomicBool,
    runtime: RwLock<AtgRuntime>,
    skipped: RwLock<HashMap<ConnectorId, u64>>,
    drivers: Mutex<Vec<JoinHandle<()>>>,
}

impl AutomaticTransactionGenerator {
    pub fn new(
        state: Arc<StationState>,
        sender: Arc<dyn RequestSender>,
        perf: Arc<dyn PerformanceSink>,
        config: AtgConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            sender,
            perf,
            config,
            time_to_stop: AtomicBool::new(true),
            runtime: RwLock::new(AtgRuntime::default()),
            skipped: RwLock::new(HashMap::new()),
            drivers: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &AtgConfig {
        &self.config
    }

    pub fn running(&self) -> bool {
        !self.time_to_stop.load(Ordering::SeqCst)
    }

    pub async fn started_at(&self) -> Option<DateTime<Utc>> {
        self.runtime.read().await.started_at
    }

    pub async fn skipped_starts(&self, connector_id: ConnectorId) -> u64 {
        self.skipped
            .read()
            .await
            .get(&connector_id)
            .copied()
            .unwrap_or(0)
    }

    /// Launch one driver per physical connector.
    pub async fn start(self: &Arc<Self>) {
        if self.running() {
            warn!(station = self.state.id(), "transaction generator already running");
            return;
        }

        {
            let mut runtime = self.runtime.write().await;
            let now = Instant::now();
            let budget = Duration::from_secs_f64(self.config.stop_after_hours * 3_600.0);
            let remaining = budget.saturating_sub(runtime.running_duration);
            runtime.started_at = Some(Utc::now());
            runtime.start_instant = Some(now);
            runtime.stop_instant = Some(now + remaining);
        }
        self.time_to_stop.store(false, Ordering::SeqCst);

        let connector_ids: Vec<ConnectorId> = {
            let connectors = self.state.connectors().read().await;
            connectors.connector_ids().collect()
        };
        let mut drivers = self.drivers.lock().await;
        // drivers left over from a previous run would wake into the new one
        for old in drivers.drain(..) {
            old.abort();
        }
        for connector_id in connector_ids {
            let atg = Arc::clone(self);
            drivers.push(tokio::spawn(async move {
                atg.drive_connector(connector_id).await;
            }));
        }
        info!(station = self.state.id(), "transaction generator started");
    }

    /// Close running transactions and raise the stop flag.
    pub async fn stop(&self, reason: Option<Reason>) {
        if !self.running() {
            return;
        }
        let started: Vec<ConnectorId> = {
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
        for connector_id in started {
            if let Err(err) =
                transaction::stop_transaction(&self.state, &self.sender, connector_id, reason).await
            {
                warn!(
                    station = self.state.id(),
                    connector = connector_id,
                    error = %err,
                    "generator stop: transaction close failed"
                );
            }
        }
        self.time_to_stop.store(true, Ordering::SeqCst);
        info!(station = self.state.id(), "transaction generator stopped");
    }

    async fn drive_connector(self: Arc<Self>, connector_id: ConnectorId) {
        debug!(
            station = self.state.id(),
            connector = connector_id,
            "transaction driver up"
        );
        while self.running() {
            let stop_instant = self.runtime.read().await.stop_instant;
            if stop_instant.is_some_and(|at| Instant::now() > at) {
                self.stop(None).await;
                break;
            }
            if !self.state.is_registered().await {
                error!(
                    station = self.state.id(),
                    connector = connector_id,
                    "station not registered, driver exiting"
                );
                break;
            }
            if !self.state.station_available().await {
                self.stop(None).await;
                break;
            }
            let connector_operative = {
                let connectors = self.state.connectors().read().await;
                connectors
                    .lookup(connector_id)
                    .map(|c| c.operative())
                    .unwrap_or(false)
            };
            if !connector_operative {
                debug!(
                    station = self.state.id(),
                    connector = connector_id,
                    "connector inoperative, driver exiting"
                );
                break;
            }
            if !self.sender.ready() {
                sleep(ATG_INIT_TIME).await;
                continue;
            }

            let idle = uniform_secs(
                self.config.min_delay_between_two_transactions,
                self.config.max_delay_between_two_transactions,
            );
            sleep(idle).await;

            let draw: f64 = OsRng.gen_range(0.0..1.0);
            if draw >= self.config.probability_of_start {
                let mut skipped = self.skipped.write().await;
                let count = skipped.entry(connector_id).or_insert(0);
                *count += 1;
                debug!(
                    station = self.state.id(),
                    connector = connector_id,
                    skipped = *count,
                    "start skipped"
                );
                continue;
            }
            self.skipped.write().await.insert(connector_id, 0);

            let started_at = Instant::now();
            let started = self.try_start(connector_id).await;
            self.perf.record("atg.start_transaction", started_at.elapsed());

            if !started {
                sleep(ATG_WAIT_TIME).await;
            } else {
                let duration = uniform_secs(self.config.min_duration, self.config.max_duration);
                debug!(
                    station = self.state.id(),
                    connector = connector_id,
                    duration_ms = duration.as_millis() as u64,
                    "transaction running"
                );
                sleep(duration).await;

                let still_running = {
                    let connectors = self.state.connectors().read().await;
                    connectors
                        .lookup(connector_id)
                        .map(|c| c.transaction_started())
                        .unwrap_or(false)
                };
                if still_running {
                    let stopped_at = Instant::now();
                    if let Err(err) = transaction::stop_transaction(
                        &self.state,
                        &self.sender,
                        connector_id,
                        None,
                    )
                    .await
                    {
                        warn!(
                            station = self.state.id(),
                            connector = connector_id,
                            error = %err,
                            "generator stop transaction failed"
                        );
                    }
                    self.perf.record("atg.stop_transaction", stopped_at.elapsed());
                }
            }

            let mut runtime = self.runtime.write().await;
            if let Some(start) = runtime.start_instant {
                runtime.running_duration = start.elapsed();
            }
        }
        debug!(
            station = self.state.id(),
            connector = connector_id,
            "transaction driver down"
        );
    }

    /// One start attempt; resilient to Central-System hiccups.
    async fn try_start(&self, connector_id: ConnectorId) -> bool {
        let outcome = self.start_connector_transaction(connector_id).await;
        match outcome {
            Ok(started) => started,
            Err(err) => {
                warn!(
                    station = self.state.id(),
                    connector = connector_id,
                    error = %err,
                    "generator start transaction failed"
                );
                false
            }
        }
    }

    async fn start_connector_transaction(
        &self,
        connector_id: ConnectorId,
    ) -> Result<bool, StationError> {
        let id_tag = pick_tag(&self.state.info().authorized_tags);

        if let Some(tag) = &id_tag {
            if self.state.info().require_authorize {
                let response = self.sender.send_authorize(tag.clone()).await?;
                if !response.id_tag_info.accepted() {
                    debug!(
                        station = self.state.id(),
                        connector = connector_id,
                        id_tag = %tag,
                        "authorize refused"
                    );
                    return Ok(false);
                }
                let mut connectors = self.state.connectors().write().await;
                if let Some(connector) = connectors.lookup_mut(connector_id) {
                    connector.set_authorize_id_tag(Some(tag.clone()));
                }
            }
        }

        let response =
            transaction::start_transaction(&self.state, &self.sender, connector_id, id_tag).await?;
        Ok(response.id_tag_info.accepted())
    }
}

fn uniform_secs(min: f64, max: f64) -> Duration {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    let secs = if (max - min).abs() < f64::EPSILON {
        min
    } else {
        OsRng.gen_range(min..max)
    };
    Duration::from_secs_f64(secs.max(0.0))
}

fn pick_tag(tags: &[IdToken]) -> Option<IdToken> {
    tags.choose(&mut OsRng).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::registered_station;
    use crate::{AtgConfig, StationInfo};
    use evsim_messages::OutgoingRequest;
    use evsim_types::common::AuthorizationStatus;

    fn fast_atg() -> AtgConfig {
        AtgConfig {
            enable: true,
            probability_of_start: 1.0,
            min_duration: 0.05,
            max_duration: 0.05,
            min_delay_between_two_transactions: 0.0,
            max_delay_between_two_transactions: 0.0,
            stop_after_hours: 1.0,
        }
    }

    fn atg_info(connector_count: u32) -> StationInfo {
        StationInfo {
            connector_count,
            // periodic sampling off so the test only sees the ATG traffic
            meter_value_sample_interval_secs: 0,
            automatic_transaction_generator: Some(fast_atg()),
            ..StationInfo::default()
        }
    }

    #[tokio::test]
    async fn happy_cycle_starts_and_stops_transactions() {
        let (station, sender) = registered_station(atg_info(1)).await;

        station.atg().start().await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        station.atg().stop(None).await;

        assert!(sender.count_action("StartTransaction") >= 1);
        assert!(sender.count_action("StopTransaction") >= 1);

        let stop = sender
            .sent()
            .into_iter()
            .find_map(|request| match request {
                OutgoingRequest::StopTransaction(req) => Some(req),
                _ => None,
            })
            .unwrap();
        assert_eq!(stop.reason, None);
    }

    #[tokio::test]
    async fn authorize_is_required_when_configured() {
        let mut info = atg_info(1);
        info.authorized_tags = vec!["TAG-A".to_string(), "TAG-B".to_string()];
        info.require_authorize = true;
        let (station, sender) = registered_station(info).await;

        station.atg().start().await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        station.atg().stop(None).await;

        assert!(sender.count_action("Authorize") >= 1);
        let start = sender
            .sent()
            .into_iter()
            .find_map(|request| match request {
                OutgoingRequest::StartTransaction(req) => Some(req),
                _ => None,
            })
            .unwrap();
        let tag = start.id_tag.unwrap();
        assert!(tag == "TAG-A" || tag == "TAG-B");
    }

    #[tokio::test]
    async fn refused_authorize_never_starts() {
        let mut info = atg_info(1);
        info.authorized_tags = vec!["TAG-A".to_string()];
        info.require_authorize = true;
        let (station, sender) = registered_station(info).await;
        sender.set_authorize_status(AuthorizationStatus::Blocked);

        station.atg().start().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        station.atg().stop(None).await;

        assert!(sender.count_action("Authorize") >= 1);
        assert_eq!(sender.count_action("StartTransaction"), 0);
    }

    #[tokio::test]
    async fn zero_probability_only_skips() {
        let mut info = atg_info(1);
        info.automatic_transaction_generator = Some(AtgConfig {
            probability_of_start: 0.0,
            ..fast_atg()
        });
        let (station, sender) = registered_station(info).await;

        station.atg().start().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        station.atg().stop(None).await;

        assert_eq!(sender.count_action("StartTransaction"), 0);
        assert!(station.atg().skipped_starts(1).await >= 1);
    }

    #[tokio::test]
    async fn stop_closes_running_transactions_once() {
        let mut info = atg_info(1);
        info.automatic_transaction_generator = Some(AtgConfig {
            min_duration: 30.0,
            max_duration: 30.0,
            ..fast_atg()
        });
        let (station, sender) = registered_station(info).await;

        station.atg().start().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(sender.count_action("StartTransaction") >= 1);

        station.atg().stop(Some(Reason::Local)).await;
        assert_eq!(sender.count_action("StopTransaction"), 1);
        assert!(!station.atg().running());

        let connectors = station.state().connectors().read().await;
        assert!(!connectors.lookup(1).unwrap().transaction_started());
    }

    #[tokio::test]
    async fn unregistered_station_gets_no_traffic() {
        let (station, sender) = registered_station(atg_info(1)).await;
        station
            .state()
            .set_registration(crate::station::RegistrationState::Unknown)
            .await;

        station.atg().start().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(sender.count_action("StartTransaction"), 0);
    }

    #[tokio::test]
    async fn drivers_cover_every_connector() {
        let (station, sender) = registered_station(atg_info(2)).await;

        station.atg().start().await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        station.atg().stop(None).await;

        let connectors_seen: std::collections::HashSet<u32> = sender
            .sent()
            .into_iter()
            .filter_map(|request| match request {
                OutgoingRequest::StartTransaction(req) => Some(req.connector_id),
                _ => None,
            })
            .collect();
        assert!(connectors_seen.contains(&1));
        assert!(connectors_seen.contains(&2));
    }
}
