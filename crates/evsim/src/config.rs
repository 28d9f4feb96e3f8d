//! Fleet descriptor loading.

use anyhow::Context;
use evsim_station::StationInfo;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level simulator configuration, one file per fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FleetConfig {
    /// Central System base URL; station ids are appended as path segments
    pub central_system_url: String,
    pub request_timeout_secs: u64,
    pub reconnect_interval_secs: u64,
    pub ui_server: UiServerConfig,
    pub stations: Vec<StationInfo>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            central_system_url: "ws://localhost:8080/ocpp".to_string(),
            request_timeout_secs: 30,
            reconnect_interval_secs: 5,
            ui_server: UiServerConfig::default(),
            stations: vec![StationInfo::default()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for UiServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl FleetConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fleet config {}", path.display()))?;
        let config: FleetConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fleet config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.stations.is_empty(), "fleet has no stations");
        let mut seen = std::collections::HashSet::new();
        for station in &self.stations {
            anyhow::ensure!(
                seen.insert(&station.charging_station_id),
                "duplicate station id: {}",
                station.charging_station_id
            );
            anyhow::ensure!(
                station.connector_count > 0,
                "station {} has no connectors",
                station.charging_station_id
            );
        }
        Ok(())
    }
}
