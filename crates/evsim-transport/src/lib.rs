//! # WebSocket transport to the Central System
//!
//! Implements the station core's outbound contract over
//! `tokio-tungstenite`: CALLs are correlated to their CALLRESULT /
//! CALLERROR by message id, sends issued while the socket is down are
//! buffered and flushed on reconnect (unless the caller opted out), and
//! incoming CALLs are dispatched to the station router on their own task so
//! nested requests can complete.

pub mod client;
pub mod error;

pub use client::{CentralSystemClient, TransportConfig};
pub use error::TransportError;
