//! # OCPP 1.6-J foundational types
//!
//! Shared vocabulary for the fleet simulator: the OCPP-J frame envelope
//! (CALL / CALLRESULT / CALLERROR array framing), the CALLERROR code set,
//! and the OCPP 1.6 enums and data structures used by request payloads.

pub mod common;
pub mod error;
pub mod frame;
pub mod v16;

pub use error::{CallErrorCode, OcppError, OcppResult};
pub use frame::{CallError, Frame};

/// Identifier presented by the EV driver (RFID tag, app token, ...).
pub type IdToken = String;

/// Central-System-assigned transaction identifier.
pub type TransactionId = i32;

/// Connector identifier; 0 addresses the charging station itself.
pub type ConnectorId = u32;
