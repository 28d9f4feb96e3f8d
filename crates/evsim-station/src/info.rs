//! Station descriptor contract.
//!
//! The fleet loader materializes one [`StationInfo`] per simulated station;
//! the core only consumes this shape.

use evsim_types::v16::FeatureProfile;
use evsim_types::IdToken;
use serde::{Deserialize, Serialize};

use crate::ATG_DEFAULT_STOP_AFTER_HOURS;

/// Everything the core needs to know about one simulated station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StationInfo {
    /// Station identity on the OCPP wire
    pub charging_station_id: String,
    pub charge_point_vendor: String,
    pub charge_point_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    /// Connectors 1..=connector_count; connector 0 is implicit
    pub connector_count: u32,
    /// Simulated charge power per connector, in watts
    pub charge_power_w: f64,
    /// Simulated down-time of a Reset, in seconds
    pub reset_time_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub web_socket_ping_interval_secs: u64,
    pub meter_value_sample_interval_secs: u64,
    /// Feature profiles advertised via SupportedFeatureProfiles
    pub feature_profiles: Vec<FeatureProfile>,
    /// Tags the station recognizes locally and the ATG draws from
    pub authorized_tags: Vec<IdToken>,
    /// ATG must Authorize before StartTransaction
    pub require_authorize: bool,
    pub authorize_remote_tx_requests: bool,
    pub local_auth_list_enabled: bool,
    pub may_authorize_at_remote_start: bool,
    /// When off, a station in unknown registration state still processes
    /// commands
    pub ocpp_strict_compliance: bool,
    pub begin_end_meter_values: bool,
    pub out_of_order_end_meter_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_transaction_generator: Option<AtgConfig>,
}

impl Default for StationInfo {
    fn default() -> Self {
        Self {
            charging_station_id: "CS-0001".to_string(),
            charge_point_vendor: "EvSim".to_string(),
            charge_point_model: "Virtual-2".to_string(),
            firmware_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            connector_count: 2,
            charge_power_w: 7_360.0,
            reset_time_secs: 30,
            heartbeat_interval_secs: crate::DEFAULT_HEARTBEAT_INTERVAL_SECS,
            web_socket_ping_interval_secs: 0,
            meter_value_sample_interval_secs: 60,
            feature_profiles: vec![
                FeatureProfile::Core,
                FeatureProfile::FirmwareManagement,
                FeatureProfile::RemoteTrigger,
                FeatureProfile::SmartCharging,
            ],
            authorized_tags: Vec::new(),
            require_authorize: false,
            authorize_remote_tx_requests: false,
            local_auth_list_enabled: false,
            may_authorize_at_remote_start: true,
            ocpp_strict_compliance: true,
            begin_end_meter_values: false,
            out_of_order_end_meter_values: false,
            automatic_transaction_generator: None,
        }
    }
}

impl StationInfo {
    pub fn has_feature_profile(&self, profile: FeatureProfile) -> bool {
        self.feature_profiles.contains(&profile)
    }

    pub fn is_tag_authorized(&self, id_tag: &str) -> bool {
        self.authorized_tags.iter().any(|tag| tag == id_tag)
    }
}

/// Parameters of the randomized per-connector transaction driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtgConfig {
    pub enable: bool,
    /// Chance, per iteration, that a transaction is started
    pub probability_of_start: f64,
    /// Transaction duration bounds, seconds
    pub min_duration: f64,
    pub max_duration: f64,
    /// Idle bounds between two transactions, seconds
    pub min_delay_between_two_transactions: f64,
    pub max_delay_between_two_transactions: f64,
    /// Total run budget, hours
    pub stop_after_hours: f64,
}

impl Default for AtgConfig {
    fn default() -> Self {
        Self {
            enable: false,
            probability_of_start: 0.7,
            min_duration: 60.0,
            max_duration: 120.0,
            min_delay_between_two_transactions: 15.0,
            max_delay_between_two_transactions: 30.0,
            stop_after_hours: ATG_DEFAULT_STOP_AFTER_HOURS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let info: StationInfo = serde_json::from_str(
            r#"{
                "chargingStationId": "CS-TEST",
                "connectorCount": 3,
                "authorizedTags": ["AAA", "BBB"],
                "automaticTransactionGenerator": { "enable": true, "probabilityOfStart": 0.9 }
            }"#,
        )
        .unwrap();

        assert_eq!(info.charging_station_id, "CS-TEST");
        assert_eq!(info.connector_count, 3);
        assert!(info.is_tag_authorized("BBB"));
        assert!(!info.is_tag_authorized("CCC"));

        let atg = info.automatic_transaction_generator.unwrap();
        assert!(atg.enable);
        assert!((atg.probability_of_start - 0.9).abs() < f64::EPSILON);
        assert!((atg.stop_after_hours - ATG_DEFAULT_STOP_AFTER_HOURS).abs() < f64::EPSILON);
    }

    #[test]
    fn feature_profile_lookup() {
        let info = StationInfo::default();
        assert!(info.has_feature_profile(FeatureProfile::SmartCharging));
        assert!(!info.has_feature_profile(FeatureProfile::Reservation));
    }
}
