//! telemetry/counters.rs
//! Mutable counters accumulated by a chained-cipher context.
//!
//! Summary: counts records, lanes and bytes across `process` calls.
//! Converted into an immutable `TelemetrySnapshot` on demand.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffloadCounters {
    /// Records sent through the accelerator.
    pub records_offloaded: u64,
    /// Records served by the software fallback.
    pub records_fallback: u64,
    pub lanes_submitted: u64,
    /// Lanes whose completion callback fired.
    pub lanes_processed: u64,
    pub submit_failures: u64,
    /// Records rejected by digest or padding verification (not told apart).
    pub verify_failures: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl OffloadCounters {
    /// Record one accelerator call of `lanes` records.
    pub fn add_offload(&mut self, lanes: usize, submitted: usize, processed: usize) {
        self.records_offloaded += lanes as u64;
        self.lanes_submitted += submitted as u64;
        self.lanes_processed += processed as u64;
    }

    pub fn add_fallback(&mut self, bytes_in: usize, bytes_out: usize) {
        self.records_fallback += 1;
        self.add_bytes(bytes_in, bytes_out);
    }

    pub fn add_bytes(&mut self, bytes_in: usize, bytes_out: usize) {
        self.bytes_in += bytes_in as u64;
        self.bytes_out += bytes_out as u64;
    }

    pub fn add_submit_failure(&mut self) {
        self.submit_failures += 1;
    }

    pub fn add_verify_failure(&mut self) {
        self.verify_failures += 1;
    }

    /// Total records handled on either path.
    pub fn records_total(&self) -> u64 {
        self.records_offloaded + self.records_fallback
    }

    pub fn merge(&mut self, other: &OffloadCounters) {
        self.records_offloaded += other.records_offloaded;
        self.records_fallback += other.records_fallback;
        self.lanes_submitted += other.lanes_submitted;
        self.lanes_processed += other.lanes_processed;
        self.submit_failures += other.submit_failures;
        self.verify_failures += other.verify_failures;
        self.bytes_in += other.bytes_in;
        self.bytes_out += other.bytes_out;
    }
}

impl AddAssign for OffloadCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}
