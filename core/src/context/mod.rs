//! Chained-cipher context: the per-stream state machine.

pub mod chained;
pub mod flags;
mod process;

pub use chained::{ChainedCipherCtx, PipelineOutput};
pub use flags::{InitFlags, InitSequence};
