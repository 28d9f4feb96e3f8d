//! Fleet registry: builds and owns the simulated stations.

use crate::config::FleetConfig;
use evsim_station::{LogPerformanceSink, RequestSender, Station};
use evsim_transport::{CentralSystemClient, TransportConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// All stations of one simulator process.
#[derive(Default)]
pub struct Fleet {
    stations: RwLock<HashMap<String, Arc<Station>>>,
    links: RwLock<Vec<Arc<CentralSystemClient>>>,
}

impl Fleet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn register(&self, station: Arc<Station>, link: Arc<CentralSystemClient>) {
        self.stations
            .write()
            .await
            .insert(station.id().to_string(), station);
        self.links.write().await.push(link);
    }

    /// Station ids, sorted for stable listings.
    pub async fn station_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn station(&self, id: &str) -> Option<Arc<Station>> {
        self.stations.read().await.get(id).cloned()
    }

    pub async fn stop_all(&self) {
        for station in self.stations.read().await.values() {
            station.stop(None).await;
        }
        for link in self.links.read().await.iter() {
            link.close().await;
        }
        info!("fleet stopped");
    }
}

/// Build every station from the descriptor and bring it online.
pub async fn bootstrap(config: &FleetConfig) -> anyhow::Result<Arc<Fleet>> {
    let fleet = Fleet::new();
    let perf = Arc::new(LogPerformanceSink);

    for info in &config.stations {
        let transport_config = TransportConfig {
            central_system_url: config.central_system_url.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            reconnect_interval: Duration::from_secs(config.reconnect_interval_secs),
        };
        let link = CentralSystemClient::new(&info.charging_station_id, transport_config);
        let station = Station::new(
            info.clone(),
            link.clone() as Arc<dyn RequestSender>,
            perf.clone(),
        );
        link.attach_station(station.clone()).await;
        link.run().await;
        station.start().await;
        info!(station = station.id(), "station launched");
        fleet.register(station, link).await;
    }

    Ok(fleet)
}
