//! # Simulated OCPP 1.6-J charging station
//!
//! The protocol engine of the fleet simulator. A [`station::Station`] owns a
//! connector map, a configuration store, its registration state and the
//! periodic heartbeat/ping tasks; the incoming-request router dispatches the
//! Central-System command surface against that state, and the
//! [`atg::AutomaticTransactionGenerator`] drives randomized transaction
//! traffic per connector.
//!
//! All egress goes through the [`outbound::RequestSender`] contract; the
//! station never touches a socket directly.

pub mod atg;
pub mod configuration;
pub mod connector;
pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod info;
pub mod outbound;
pub mod perf;
pub mod station;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{CommandFailure, StationError};
pub use info::{AtgConfig, StationInfo};
pub use outbound::{RequestSender, RequestSenderExt, SendOptions};
pub use perf::{LogPerformanceSink, NoopPerformanceSink, PerformanceSink};
pub use station::{RegistrationState, Station, StationState};

use std::time::Duration;

/// Delay before a triggered message (TriggerMessage) is actually sent.
pub const TRIGGER_MESSAGE_DELAY: Duration = Duration::from_millis(500);

/// Retry delay while the ATG waits for the outbound adapter to come up.
pub const ATG_INIT_TIME: Duration = Duration::from_secs(1);

/// Back-off after the Central System refuses an ATG start attempt.
pub const ATG_WAIT_TIME: Duration = Duration::from_secs(1);

/// Default ATG run budget when the descriptor leaves stopAfterHours unset.
pub const ATG_DEFAULT_STOP_AFTER_HOURS: f64 = 0.25;

/// Heartbeat cadence used until the Central System assigns one.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 60;
