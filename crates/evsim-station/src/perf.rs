//! Performance measurement sink contract.
//!
//! The ATG reports the duration of every start/stop attempt here. The sink
//! is passed in at construction; handler code never reaches for a global.

use std::time::Duration;

pub trait PerformanceSink: Send + Sync {
    fn record(&self, name: &str, elapsed: Duration);
}

/// Discards all measurements.
#[derive(Debug, Default)]
pub struct NoopPerformanceSink;

impl PerformanceSink for NoopPerformanceSink {
    fn record(&self, _name: &str, _elapsed: Duration) {}
}

/// Emits measurements as `tracing` debug events.
#[derive(Debug, Default)]
pub struct LogPerformanceSink;

impl PerformanceSink for LogPerformanceSink {
    fn record(&self, name: &str, elapsed: Duration) {
        tracing::debug!(measurement = name, elapsed_ms = elapsed.as_millis() as u64, "perf");
    }
}
