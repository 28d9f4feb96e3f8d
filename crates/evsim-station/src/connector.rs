//! Per-connector state.
//!
//! Pure data with accessors that uphold the connector invariants; all I/O
//! happens in the callers. Connector 0 is the station-level
//! pseudo-connector: it carries availability for the whole station and the
//! ChargePointMaxProfile stack, but never a transaction.

use crate::error::StationError;
use evsim_types::common::AvailabilityType;
use evsim_types::v16::{ChargePointStatus, ChargingProfile, ChargingProfilePurpose};
use evsim_types::{ConnectorId, IdToken, TransactionId};
use std::collections::BTreeMap;

/// State of a single connector.
#[derive(Debug, Clone)]
pub struct Connector {
    status: ChargePointStatus,
    availability: AvailabilityType,
    transaction_started: bool,
    transaction_id: Option<TransactionId>,
    transaction_id_tag: Option<IdToken>,
    transaction_remote_started: bool,
    /// Energy.Active.Import.Register in Wh, carried across the transaction
    energy_register_wh: f64,
    authorize_id_tag: Option<IdToken>,
    local_authorize_id_tag: Option<IdToken>,
    id_tag_local_authorized: bool,
    charging_profiles: Vec<ChargingProfile>,
}

impl Default for Connector {
    fn default() -> Self {
        Self {
            status: ChargePointStatus::Available,
            availability: AvailabilityType::Operative,
            transaction_started: false,
            transaction_id: None,
            transaction_id_tag: None,
            transaction_remote_started: false,
            energy_register_wh: 0.0,
            authorize_id_tag: None,
            local_authorize_id_tag: None,
            id_tag_local_authorized: false,
            charging_profiles: Vec::new(),
        }
    }
}

impl Connector {
    pub fn status(&self) -> ChargePointStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ChargePointStatus) {
        self.status = status;
    }

    pub fn availability(&self) -> AvailabilityType {
        self.availability
    }

    pub fn set_availability(&mut self, availability: AvailabilityType) {
        self.availability = availability;
    }

    pub fn operative(&self) -> bool {
        self.availability == AvailabilityType::Operative
    }

    pub fn transaction_started(&self) -> bool {
        self.transaction_started
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    pub fn transaction_id_tag(&self) -> Option<&IdToken> {
        self.transaction_id_tag.as_ref()
    }

    pub fn transaction_remote_started(&self) -> bool {
        self.transaction_remote_started
    }

    pub fn set_transaction_remote_started(&mut self, remote: bool) {
        self.transaction_remote_started = remote;
    }

    pub fn energy_register_wh(&self) -> f64 {
        self.energy_register_wh
    }

    pub fn add_energy_wh(&mut self, delta_wh: f64) {
        self.energy_register_wh += delta_wh;
    }

    pub fn authorize_id_tag(&self) -> Option<&IdToken> {
        self.authorize_id_tag.as_ref()
    }

    pub fn set_authorize_id_tag(&mut self, id_tag: Option<IdToken>) {
        self.authorize_id_tag = id_tag;
    }

    pub fn local_authorize_id_tag(&self) -> Option<&IdToken> {
        self.local_authorize_id_tag.as_ref()
    }

    pub fn id_tag_local_authorized(&self) -> bool {
        self.id_tag_local_authorized
    }

    pub fn set_local_authorization(&mut self, id_tag: IdToken) {
        self.local_authorize_id_tag = Some(id_tag);
        self.id_tag_local_authorized = true;
    }

    /// Record a transaction accepted by the Central System.
    ///
    /// An inoperative connector may finish its current transaction but must
    /// not host a new one; at most one transaction per connector.
    pub fn begin_transaction(
        &mut self,
        connector_id: ConnectorId,
        transaction_id: TransactionId,
        id_tag: Option<IdToken>,
    ) -> Result<(), StationError> {
        if self.transaction_started {
            return Err(StationError::TransactionInProgress(connector_id));
        }
        if !self.operative() {
            return Err(StationError::Inoperative(connector_id));
        }
        self.transaction_started = true;
        self.transaction_id = Some(transaction_id);
        self.transaction_id_tag = id_tag;
        Ok(())
    }

    /// Drop the transaction and reset every transient field.
    pub fn clear_transaction(&mut self) {
        self.transaction_started = false;
        self.transaction_id = None;
        self.transaction_id_tag = None;
        self.transaction_remote_started = false;
        self.energy_register_wh = 0.0;
        self.authorize_id_tag = None;
        self.local_authorize_id_tag = None;
        self.id_tag_local_authorized = false;
    }

    pub fn charging_profiles(&self) -> &[ChargingProfile] {
        &self.charging_profiles
    }

    /// Install a profile, replacing any entry with the same id or the same
    /// (purpose, stackLevel) pair per OCPP stacking semantics.
    pub fn install_profile(&mut self, profile: ChargingProfile) {
        self.charging_profiles.retain(|existing| {
            existing.charging_profile_id != profile.charging_profile_id
                && !(existing.charging_profile_purpose == profile.charging_profile_purpose
                    && existing.stack_level == profile.stack_level)
        });
        self.charging_profiles.push(profile);
    }

    pub fn clear_profiles(&mut self) -> usize {
        let cleared = self.charging_profiles.len();
        self.charging_profiles.clear();
        cleared
    }

    /// Remove profiles matching the predicate, returning how many went.
    pub fn clear_profiles_matching<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&ChargingProfile) -> bool,
    {
        let before = self.charging_profiles.len();
        self.charging_profiles.retain(|profile| !predicate(profile));
        before - self.charging_profiles.len()
    }

    pub fn has_profile_purpose(&self, purpose: ChargingProfilePurpose) -> bool {
        self.charging_profiles
            .iter()
            .any(|profile| profile.charging_profile_purpose == purpose)
    }
}

/// All connectors of one station, keyed by id. Id 0 always exists.
#[derive(Debug)]
pub struct ConnectorMap {
    connectors: BTreeMap<ConnectorId, Connector>,
}

impl ConnectorMap {
    /// Build connector 0 plus ids 1..=count, all Available/Operative.
    pub fn new(count: u32) -> Self {
        let connectors = (0..=count).map(|id| (id, Connector::default())).collect();
        Self { connectors }
    }

    pub fn lookup(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.get(&id)
    }

    pub fn lookup_mut(&mut self, id: ConnectorId) -> Option<&mut Connector> {
        self.connectors.get_mut(&id)
    }

    /// Every id, the station-level pseudo-connector included.
    pub fn ids(&self) -> impl Iterator<Item = ConnectorId> + '_ {
        self.connectors.keys().copied()
    }

    /// Ids of the physical connectors (id > 0).
    pub fn connector_ids(&self) -> impl Iterator<Item = ConnectorId> + '_ {
        self.ids().filter(|id| *id > 0)
    }

    /// Station-level availability: connector 0 dominates.
    pub fn station_available(&self) -> bool {
        self.lookup(0).map(Connector::operative).unwrap_or(false)
    }

    pub fn energy_register_for(&self, transaction_id: TransactionId) -> Option<f64> {
        self.find_transaction(transaction_id)
            .map(|(_, connector)| connector.energy_register_wh())
    }

    pub fn id_tag_for(&self, transaction_id: TransactionId) -> Option<IdToken> {
        self.find_transaction(transaction_id)
            .and_then(|(_, connector)| connector.transaction_id_tag().cloned())
    }

    pub fn transaction_connector_id(&self, transaction_id: TransactionId) -> Option<ConnectorId> {
        self.find_transaction(transaction_id).map(|(id, _)| id)
    }

    fn find_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Option<(ConnectorId, &Connector)> {
        self.connectors.iter().find_map(|(id, connector)| {
            (*id > 0 && connector.transaction_started()
                && connector.transaction_id() == Some(transaction_id))
            .then_some((*id, connector))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evsim_types::v16::{
        ChargingProfileKind, ChargingRateUnit, ChargingSchedule, ChargingSchedulePeriod,
    };

    fn profile(id: i32, purpose: ChargingProfilePurpose, stack_level: i32) -> ChargingProfile {
        ChargingProfile {
            charging_profile_id: id,
            transaction_id: None,
            stack_level,
            charging_profile_purpose: purpose,
            charging_profile_kind: ChargingProfileKind::Relative,
            recurrency_kind: None,
            valid_from: None,
            valid_to: None,
            charging_schedule: ChargingSchedule {
                duration: None,
                start_schedule: None,
                charging_rate_unit: ChargingRateUnit::A,
                charging_schedule_period: vec![ChargingSchedulePeriod {
                    start_period: 0,
                    limit: 16.0,
                    number_phases: None,
                }],
                min_charging_rate: None,
            },
        }
    }

    #[test]
    fn map_initializes_pseudo_connector() {
        let map = ConnectorMap::new(2);
        assert_eq!(map.ids().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(map.connector_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert!(map.station_available());
        assert_eq!(map.lookup(1).unwrap().status(), ChargePointStatus::Available);
    }

    #[test]
    fn transaction_fields_track_invariants() {
        let mut map = ConnectorMap::new(1);
        let connector = map.lookup_mut(1).unwrap();

        connector
            .begin_transaction(1, 42, Some("TAG".to_string()))
            .unwrap();
        assert!(connector.transaction_started());
        assert_eq!(connector.transaction_id(), Some(42));
        assert_eq!(connector.transaction_id_tag().unwrap(), "TAG");

        // at most one transaction per connector
        let err = connector.begin_transaction(1, 43, None).unwrap_err();
        assert!(matches!(err, StationError::TransactionInProgress(1)));

        connector.add_energy_wh(512.0);
        assert_eq!(map.energy_register_for(42), Some(512.0));
        assert_eq!(map.id_tag_for(42), Some("TAG".to_string()));
        assert_eq!(map.transaction_connector_id(42), Some(1));
        assert_eq!(map.transaction_connector_id(99), None);
    }

    #[test]
    fn clear_transaction_resets_transients() {
        let mut connector = Connector::default();
        connector.begin_transaction(1, 7, Some("T".to_string())).unwrap();
        connector.set_transaction_remote_started(true);
        connector.set_authorize_id_tag(Some("T".to_string()));
        connector.set_local_authorization("T".to_string());
        connector.add_energy_wh(100.0);

        connector.clear_transaction();

        assert!(!connector.transaction_started());
        assert_eq!(connector.transaction_id(), None);
        assert_eq!(connector.transaction_id_tag(), None);
        assert!(!connector.transaction_remote_started());
        assert_eq!(connector.energy_register_wh(), 0.0);
        assert_eq!(connector.authorize_id_tag(), None);
        assert_eq!(connector.local_authorize_id_tag(), None);
        assert!(!connector.id_tag_local_authorized());
    }

    #[test]
    fn inoperative_connector_refuses_new_transaction() {
        let mut connector = Connector::default();
        connector.set_availability(AvailabilityType::Inoperative);
        let err = connector.begin_transaction(2, 1, None).unwrap_err();
        assert!(matches!(err, StationError::Inoperative(2)));
    }

    #[test]
    fn install_profile_replaces_by_id_and_by_stack() {
        let mut connector = Connector::default();
        connector.install_profile(profile(1, ChargingProfilePurpose::TxProfile, 0));
        connector.install_profile(profile(2, ChargingProfilePurpose::TxProfile, 1));
        assert_eq!(connector.charging_profiles().len(), 2);

        // same id replaces
        connector.install_profile(profile(1, ChargingProfilePurpose::TxProfile, 5));
        assert_eq!(connector.charging_profiles().len(), 2);

        // same (purpose, stackLevel) replaces
        connector.install_profile(profile(9, ChargingProfilePurpose::TxProfile, 1));
        assert_eq!(connector.charging_profiles().len(), 2);
        assert!(connector
            .charging_profiles()
            .iter()
            .any(|p| p.charging_profile_id == 9));
    }

    #[test]
    fn clear_profiles_matching_counts() {
        let mut connector = Connector::default();
        connector.install_profile(profile(1, ChargingProfilePurpose::TxProfile, 0));
        connector.install_profile(profile(2, ChargingProfilePurpose::ChargePointMaxProfile, 0));

        let cleared = connector.clear_profiles_matching(|p| p.charging_profile_id == 2);
        assert_eq!(cleared, 1);
        assert_eq!(connector.charging_profiles().len(), 1);
    }
}
