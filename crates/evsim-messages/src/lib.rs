//! # OCPP 1.6-J message payloads
//!
//! Request/response payload structs for every OCPP action the simulator
//! speaks, plus tagged-variant [`IncomingRequest`] and [`OutgoingRequest`]
//! enums so command dispatch is matched on a variant instead of an action
//! string in hot paths.

pub mod incoming;
pub mod outgoing;
pub mod v16;

pub use incoming::{IncomingRequest, ParseError};
pub use outgoing::OutgoingRequest;

use serde::{de::DeserializeOwned, Serialize};

/// An OCPP action: its wire name and the paired response payload.
pub trait OcppAction: Serialize + DeserializeOwned + Send + Sync {
    const ACTION: &'static str;
    type Response: Serialize + DeserializeOwned + Send + Sync;
}
