//! accelerator/mod.rs
//! Client contract of the bulk cipher+hash accelerator.
//!
//! Design notes:
//! - The context only ever talks to `dyn Accelerator`; hardware backends and
//!   the in-process `SoftAccelerator` are interchangeable.
//! - `submit` is asynchronous. Each accepted op produces exactly one
//!   `CompletionHandler::on_complete`, possibly on another thread.
//! - Ops own their buffers; nothing is borrowed across the async boundary.

pub mod types;
pub mod soft;

use std::sync::Arc;

pub use types::*;
pub use soft::SoftAccelerator;

/// Receiver of per-op completions.
pub trait CompletionHandler: Send + Sync {
    fn on_complete(&self, completion: OpCompletion);
}

pub trait Accelerator: Send + Sync {
    /// Bytes of session state the accelerator needs for `setup`.
    fn session_ctx_size(&self, setup: &SessionSetup) -> Result<usize, AcceleratorError>;

    fn create_session(&self, setup: &SessionSetup) -> Result<SessionHandle, AcceleratorError>;

    /// (Re)bind keys and chain parameters. May be called more than once.
    fn init_session(
        &self,
        session: &SessionHandle,
        setup: &SessionSetup,
    ) -> Result<(), AcceleratorError>;

    fn submit(
        &self,
        session: &SessionHandle,
        op: SymOp,
        handler: Arc<dyn CompletionHandler>,
    ) -> Result<(), SubmitRejected>;

    fn remove_session(&self, session: &SessionHandle) -> Result<(), AcceleratorError>;
}
