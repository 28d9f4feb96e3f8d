//! Types shared by several OCPP 1.6 payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One meter reading: a timestamp with its sampled values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterValue {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "sampledValue")]
    pub sampled_value: Vec<SampledValue>,
}

/// Individual sampled value within a meter reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ReadingContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ValueFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurand: Option<Measurand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitOfMeasure>,
}

impl SampledValue {
    /// Energy.Active.Import.Register sample in Wh, the measurand the
    /// simulator reports for transaction metering.
    pub fn energy_register(value_wh: f64, context: ReadingContext) -> Self {
        Self {
            value: format!("{}", value_wh.round() as i64),
            context: Some(context),
            format: Some(ValueFormat::Raw),
            measurand: Some(Measurand::EnergyActiveImportRegister),
            location: Some(Location::Outlet),
            unit: Some(UnitOfMeasure::Wh),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingContext {
    #[serde(rename = "Interruption.Begin")]
    InterruptionBegin,
    #[serde(rename = "Interruption.End")]
    InterruptionEnd,
    #[serde(rename = "Sample.Clock")]
    SampleClock,
    #[serde(rename = "Sample.Periodic")]
    SamplePeriodic,
    #[serde(rename = "Transaction.Begin")]
    TransactionBegin,
    #[serde(rename = "Transaction.End")]
    TransactionEnd,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ValueFormat {
    Raw,
    SignedData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measurand {
    #[serde(rename = "Energy.Active.Import.Register")]
    EnergyActiveImportRegister,
    #[serde(rename = "Power.Active.Import")]
    PowerActiveImport,
    #[serde(rename = "Current.Import")]
    CurrentImport,
    Voltage,
    Temperature,
    SoC,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Location {
    Body,
    Cable,
    #[serde(rename = "EV")]
    Ev,
    Inlet,
    Outlet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOfMeasure {
    #[serde(rename = "Wh")]
    Wh,
    #[serde(rename = "kWh")]
    KWh,
    #[serde(rename = "W")]
    W,
    #[serde(rename = "kW")]
    KW,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "V")]
    V,
    Celsius,
    Percent,
}

/// Configuration key as reported by GetConfiguration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Authorization outcome attached to Authorize / StartTransaction /
/// StopTransaction responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTagInfo {
    pub status: AuthorizationStatus,
    #[serde(rename = "parentIdTag", skip_serializing_if = "Option::is_none")]
    pub parent_id_tag: Option<String>,
    #[serde(rename = "expiryDate", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl IdTagInfo {
    pub fn accepted(&self) -> bool {
        self.status == AuthorizationStatus::Accepted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
    ConcurrentTx,
}

/// Reason a transaction stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Reason {
    DeAuthorized,
    EmergencyStop,
    #[serde(rename = "EVDisconnected")]
    EvDisconnected,
    HardReset,
    Local,
    Other,
    PowerLoss,
    Reboot,
    Remote,
    SoftReset,
    UnlockCommand,
}

/// Availability requested through ChangeAvailability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AvailabilityType {
    Operative,
    Inoperative,
}

/// ChangeAvailability outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AvailabilityStatus {
    Accepted,
    Rejected,
    Scheduled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_register_sample_shape() {
        let sample = SampledValue::energy_register(1520.4, ReadingContext::TransactionEnd);
        assert_eq!(sample.value, "1520");
        assert_eq!(sample.measurand, Some(Measurand::EnergyActiveImportRegister));
        assert_eq!(sample.unit, Some(UnitOfMeasure::Wh));

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["context"], "Transaction.End");
        assert_eq!(json["measurand"], "Energy.Active.Import.Register");
    }

    #[test]
    fn key_value_omits_missing_value() {
        let kv = KeyValue {
            key: "AuthorizeRemoteTxRequests".to_string(),
            readonly: false,
            value: None,
        };
        let json = serde_json::to_string(&kv).unwrap();
        assert!(!json.contains("value"));
    }

    #[test]
    fn reason_wire_names() {
        assert_eq!(
            serde_json::to_string(&Reason::EvDisconnected).unwrap(),
            "\"EVDisconnected\""
        );
        assert_eq!(
            serde_json::to_string(&Reason::UnlockCommand).unwrap(),
            "\"UnlockCommand\""
        );
    }

    #[test]
    fn id_tag_info_accepted() {
        let info = IdTagInfo {
            status: AuthorizationStatus::Accepted,
            parent_id_tag: None,
            expiry_date: None,
        };
        assert!(info.accepted());

        let blocked = IdTagInfo {
            status: AuthorizationStatus::Blocked,
            ..info
        };
        assert!(!blocked.accepted());
    }
}
