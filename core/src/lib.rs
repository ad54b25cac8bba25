//! cipher-offload-core
//!
//! Chained AES-CBC + HMAC record engine for TLS. Bulk cipher and MAC work
//! goes to an accelerator; framing, padding arithmetic and the constant-time
//! padding check stay on the host.

#![forbid(unsafe_code)]

// Shared and top level
pub mod constants;
pub mod types;
pub mod utils;
pub mod registry;
pub mod config;

// Primitives and record framing
pub mod crypto;
pub mod record;

// Offload plumbing
pub mod accelerator;
pub mod pipeline;
pub mod fallback;
pub mod telemetry;

// Per-stream state machine
pub mod context;

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::accelerator::{Accelerator, SoftAccelerator};
    pub use crate::config::{EngineConfig, ThresholdTable};
    pub use crate::context::{ChainedCipherCtx, PipelineOutput};
    pub use crate::fallback::{CbcHmacSoftware, SoftwareCipher};
    pub use crate::pipeline::WaitStrategy;
    pub use crate::record::TlsHeader;
    pub use crate::registry::{ChainedCipherId, Direction};
    pub use crate::types::{ChainError, ChainResult};
}
