//! Station configuration store.
//!
//! OCPP key/value settings with read-only, visibility and reboot-required
//! flags. Keys are case-sensitive, with one exception carried over from the
//! field: `HeartBeatInterval` and `HeartbeatInterval` are aliases kept in
//! sync; writing either writes both.

use crate::info::StationInfo;
use evsim_types::common::KeyValue;
use evsim_types::v16::FeatureProfile;
use std::collections::BTreeMap;

pub const HEARTBEAT_INTERVAL_KEY: &str = "HeartbeatInterval";
pub const HEART_BEAT_INTERVAL_KEY: &str = "HeartBeatInterval";
pub const WEB_SOCKET_PING_INTERVAL_KEY: &str = "WebSocketPingInterval";
pub const AUTHORIZE_REMOTE_TX_REQUESTS_KEY: &str = "AuthorizeRemoteTxRequests";
pub const LOCAL_AUTH_LIST_ENABLED_KEY: &str = "LocalAuthListEnabled";
pub const METER_VALUE_SAMPLE_INTERVAL_KEY: &str = "MeterValueSampleInterval";
pub const NUMBER_OF_CONNECTORS_KEY: &str = "NumberOfConnectors";
pub const SUPPORTED_FEATURE_PROFILES_KEY: &str = "SupportedFeatureProfiles";
pub const CONNECTION_TIMEOUT_KEY: &str = "ConnectionTimeOut";

pub fn is_heartbeat_alias(key: &str) -> bool {
    key == HEARTBEAT_INTERVAL_KEY || key == HEART_BEAT_INTERVAL_KEY
}

fn heartbeat_sibling(key: &str) -> Option<&'static str> {
    match key {
        HEARTBEAT_INTERVAL_KEY => Some(HEART_BEAT_INTERVAL_KEY),
        HEART_BEAT_INTERVAL_KEY => Some(HEARTBEAT_INTERVAL_KEY),
        _ => None,
    }
}

/// One configuration entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationEntry {
    pub value: String,
    pub readonly: bool,
    pub visible: bool,
    pub reboot: bool,
}

impl ConfigurationEntry {
    pub fn writable(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            readonly: false,
            visible: true,
            reboot: false,
        }
    }

    pub fn readonly(value: impl Into<String>) -> Self {
        Self {
            readonly: true,
            ..Self::writable(value)
        }
    }

    pub fn hidden(value: impl Into<String>) -> Self {
        Self {
            visible: false,
            ..Self::writable(value)
        }
    }

    pub fn reboot_required(value: impl Into<String>) -> Self {
        Self {
            reboot: true,
            ..Self::writable(value)
        }
    }
}

/// Outcome of a configuration write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatus {
    Accepted {
        reboot_required: bool,
        changed: bool,
    },
    ReadOnly,
    UnknownKey,
}

#[derive(Debug, Default)]
pub struct ConfigurationStore {
    entries: BTreeMap<String, ConfigurationEntry>,
}

impl ConfigurationStore {
    /// Standard key set for a freshly provisioned station.
    pub fn for_station(info: &StationInfo) -> Self {
        let mut store = Self::default();
        let heartbeat = info.heartbeat_interval_secs.to_string();
        store.insert(HEARTBEAT_INTERVAL_KEY, ConfigurationEntry::writable(&heartbeat));
        store.insert(HEART_BEAT_INTERVAL_KEY, ConfigurationEntry::writable(&heartbeat));
        store.insert(
            WEB_SOCKET_PING_INTERVAL_KEY,
            ConfigurationEntry::writable(info.web_socket_ping_interval_secs.to_string()),
        );
        store.insert(
            AUTHORIZE_REMOTE_TX_REQUESTS_KEY,
            ConfigurationEntry::writable(info.authorize_remote_tx_requests.to_string()),
        );
        store.insert(
            LOCAL_AUTH_LIST_ENABLED_KEY,
            ConfigurationEntry::writable(info.local_auth_list_enabled.to_string()),
        );
        store.insert(
            METER_VALUE_SAMPLE_INTERVAL_KEY,
            ConfigurationEntry::writable(info.meter_value_sample_interval_secs.to_string()),
        );
        store.insert(
            NUMBER_OF_CONNECTORS_KEY,
            ConfigurationEntry::readonly(info.connector_count.to_string()),
        );
        store.insert(
            SUPPORTED_FEATURE_PROFILES_KEY,
            ConfigurationEntry::readonly(
                info.feature_profiles
                    .iter()
                    .map(|profile| profile.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        );
        store.insert(CONNECTION_TIMEOUT_KEY, ConfigurationEntry::writable("120"));
        store
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: ConfigurationEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigurationEntry> {
        self.entries.get(key)
    }

    /// Write a key. Rejects read-only entries; keeps the heartbeat aliases
    /// synchronized.
    pub fn set(&mut self, key: &str, value: &str, case_insensitive: bool) -> SetStatus {
        let resolved = if case_insensitive {
            match self
                .entries
                .keys()
                .find(|candidate| candidate.eq_ignore_ascii_case(key))
            {
                Some(found) => found.clone(),
                None => return SetStatus::UnknownKey,
            }
        } else if self.entries.contains_key(key) {
            key.to_string()
        } else {
            return SetStatus::UnknownKey;
        };

        let entry = match self.entries.get_mut(&resolved) {
            Some(entry) => entry,
            None => return SetStatus::UnknownKey,
        };
        if entry.readonly {
            return SetStatus::ReadOnly;
        }
        let changed = entry.value != value;
        entry.value = value.to_string();
        let reboot_required = entry.reboot;

        if let Some(sibling) = heartbeat_sibling(&resolved) {
            if let Some(other) = self.entries.get_mut(sibling) {
                other.value = value.to_string();
            }
        }

        SetStatus::Accepted {
            reboot_required,
            changed,
        }
    }

    /// Visible entries for GetConfiguration. An empty or absent key list
    /// selects everything visible.
    pub fn list_visible(&self, keys: Option<&[String]>) -> (Vec<KeyValue>, Vec<String>) {
        match keys {
            None | Some([]) => {
                let found = self
                    .entries
                    .iter()
                    .filter(|(_, entry)| entry.visible)
                    .map(|(key, entry)| KeyValue {
                        key: key.clone(),
                        readonly: entry.readonly,
                        value: Some(entry.value.clone()),
                    })
                    .collect();
                (found, Vec::new())
            }
            Some(keys) => {
                let mut found = Vec::new();
                let mut unknown = Vec::new();
                for key in keys {
                    match self.entries.get(key).filter(|entry| entry.visible) {
                        Some(entry) => found.push(KeyValue {
                            key: key.clone(),
                            readonly: entry.readonly,
                            value: Some(entry.value.clone()),
                        }),
                        None => unknown.push(key.clone()),
                    }
                }
                (found, unknown)
            }
        }
    }

    /// Whether SupportedFeatureProfiles advertises the given profile.
    pub fn has_feature_profile(&self, profile: FeatureProfile) -> bool {
        self.get(SUPPORTED_FEATURE_PROFILES_KEY)
            .map(|entry| {
                entry
                    .value
                    .split(',')
                    .any(|name| name.trim() == profile.as_str())
            })
            .unwrap_or(false)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|entry| entry.value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Numeric value of an interval key, in seconds.
    pub fn interval_secs(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|entry| entry.value.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConfigurationStore {
        ConfigurationStore::for_station(&StationInfo::default())
    }

    #[test]
    fn readonly_write_is_rejected_and_value_kept() {
        let mut store = store();
        let before = store.get(NUMBER_OF_CONNECTORS_KEY).unwrap().value.clone();

        assert_eq!(
            store.set(NUMBER_OF_CONNECTORS_KEY, "9", false),
            SetStatus::ReadOnly
        );
        assert_eq!(store.get(NUMBER_OF_CONNECTORS_KEY).unwrap().value, before);
    }

    #[test]
    fn heartbeat_aliases_stay_synchronized() {
        let mut store = store();

        store.set(HEART_BEAT_INTERVAL_KEY, "30", false);
        assert_eq!(store.get(HEARTBEAT_INTERVAL_KEY).unwrap().value, "30");
        assert_eq!(store.get(HEART_BEAT_INTERVAL_KEY).unwrap().value, "30");

        store.set(HEARTBEAT_INTERVAL_KEY, "45", false);
        assert_eq!(store.get(HEART_BEAT_INTERVAL_KEY).unwrap().value, "45");
        assert_eq!(store.get(HEARTBEAT_INTERVAL_KEY).unwrap().value, "45");
    }

    #[test]
    fn unknown_key_is_reported() {
        let mut store = store();
        assert_eq!(store.set("NoSuchKey", "1", false), SetStatus::UnknownKey);
    }

    #[test]
    fn case_insensitive_lookup_resolves() {
        let mut store = store();
        let status = store.set("heartbeatinterval", "90", true);
        assert!(matches!(status, SetStatus::Accepted { .. }));
        assert_eq!(store.get(HEARTBEAT_INTERVAL_KEY).unwrap().value, "90");
    }

    #[test]
    fn list_visible_hides_hidden_entries() {
        let mut store = store();
        store.insert("AuthorizationKey", ConfigurationEntry::hidden("secret"));

        let (found, unknown) = store.list_visible(None);
        assert!(unknown.is_empty());
        assert!(found.iter().all(|kv| kv.key != "AuthorizationKey"));

        let request = vec!["AuthorizationKey".to_string(), "ConnectionTimeOut".to_string()];
        let (found, unknown) = store.list_visible(Some(&request));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, CONNECTION_TIMEOUT_KEY);
        assert_eq!(unknown, vec!["AuthorizationKey".to_string()]);
    }

    #[test]
    fn empty_key_list_returns_everything_visible() {
        let store = store();
        let (all, _) = store.list_visible(Some(&[]));
        let (unfiltered, _) = store.list_visible(None);
        assert_eq!(all, unfiltered);
        assert!(!all.is_empty());
    }

    #[test]
    fn reboot_flag_is_signalled() {
        let mut store = store();
        store.insert("StationMaxPower", ConfigurationEntry::reboot_required("22000"));

        match store.set("StationMaxPower", "11000", false) {
            SetStatus::Accepted {
                reboot_required,
                changed,
            } => {
                assert!(reboot_required);
                assert!(changed);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn feature_profiles_parse_from_csv() {
        let store = store();
        assert!(store.has_feature_profile(FeatureProfile::SmartCharging));
        assert!(store.has_feature_profile(FeatureProfile::RemoteTrigger));
        assert!(!store.has_feature_profile(FeatureProfile::Reservation));
    }

    #[test]
    fn unchanged_write_reports_changed_false() {
        let mut store = store();
        let current = store.get(CONNECTION_TIMEOUT_KEY).unwrap().value.clone();
        match store.set(CONNECTION_TIMEOUT_KEY, &current, false) {
            SetStatus::Accepted { changed, .. } => assert!(!changed),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
