//! # EVSE fleet simulator
//!
//! Boots a fleet of simulated OCPP 1.6-J charging stations from a JSON
//! descriptor, connects each to the Central System over WebSocket and
//! exposes an operator UI WebSocket endpoint for fleet inspection and
//! command.

pub mod config;
pub mod fleet;
pub mod ui;
