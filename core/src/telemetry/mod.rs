//! telemetry/mod.rs
//! Offload telemetry: counters, stage timers and immutable snapshots.
//!
//! Design notes:
//! - Counters are plain integers owned by one context; no atomics, since a
//!   context is driven by one caller at a time.
//! - Snapshots are immutable and serde-serializable for reporting.

pub mod counters;
pub mod timers;
pub mod snapshot;

pub use counters::*;
pub use timers::*;
pub use snapshot::*;
