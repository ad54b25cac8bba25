//! telemetry/snapshot.rs
//! Immutable telemetry snapshot of one context.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::OffloadCounters;
use crate::telemetry::timers::{StageTimes, TelemetryTimer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub counters: OffloadCounters,
    /// Share of records that went to the accelerator, 0.0 ..= 1.0.
    pub offload_ratio: f64,
    pub throughput_bytes_per_sec: f64,
    pub elapsed: Duration,
    pub stage_times: StageTimes,
}

impl TelemetrySnapshot {
    pub fn from(counters: &OffloadCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();

        let total = counters.records_total();
        let offload_ratio = if total > 0 {
            counters.records_offloaded as f64 / total as f64
        } else {
            0.0
        };

        let throughput = if elapsed.as_secs_f64() > 0.0 {
            counters.bytes_in as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        Self {
            counters: counters.clone(),
            offload_ratio,
            throughput_bytes_per_sec: throughput,
            elapsed,
            stage_times: timer.stage_times.clone(),
        }
    }

    pub fn total_stage_time(&self) -> Duration {
        self.stage_times.total()
    }

    /// Internal invariants: processed lanes never exceed submitted lanes,
    /// stage times fit inside the elapsed time.
    pub fn sanity_check(&self) -> bool {
        self.counters.lanes_processed <= self.counters.lanes_submitted
            && self.offload_ratio <= 1.0
            && self.total_stage_time() <= self.elapsed
    }
}
