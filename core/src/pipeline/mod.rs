//! Per-call lane resources: the scratch arena and the completion tracker.

pub mod pool;
pub mod tracker;

pub use pool::LanePool;
pub use tracker::{CompletionTracker, TrackerOutcome, WaitStrategy};
