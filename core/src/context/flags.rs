//! context/flags.rs
//! Init-sequence tracking for a chained-cipher context.
//!
//! Design notes:
//! - Setup steps only ever add flags. The per-call flags (header set, lane
//!   headers, staged pipeline buffers) are consumed by `end_call`; everything
//!   else is cleared only by a full `reset`.
//! - Every transition that needs an initialized context is guarded and
//!   reports `InvalidState` instead of silently setting the bit.

use bitflags::bitflags;

use crate::types::ChainError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InitFlags: u16 {
        const CTX_INIT        = 1 << 0;
        const HMAC_KEY_SET    = 1 << 1;
        const SESSION_INIT    = 1 << 2;
        const TLS_HDR_SET     = 1 << 3;
        const PPL_OBUF_SET    = 1 << 4;
        const PPL_IBUF_SET    = 1 << 5;
        const PPL_BUF_LEN_SET = 1 << 6;
        const PPL_AADCTR_SET  = 1 << 7;
        const PPL_USED        = 1 << 8;

        const PPL_STAGED = Self::PPL_OBUF_SET.bits()
            | Self::PPL_IBUF_SET.bits()
            | Self::PPL_BUF_LEN_SET.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InitSequence {
    flags: InitFlags,
}

impl InitSequence {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn flags(&self) -> InitFlags {
        self.flags
    }

    #[inline]
    pub fn contains(&self, flag: InitFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_initialized(&self) -> bool {
        self.contains(InitFlags::CTX_INIT)
    }

    pub fn require_initialized(&self, op: &str) -> Result<(), ChainError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ChainError::invalid_state(format!("{} on an uninitialized context", op)))
        }
    }

    /// First transition; only valid from the empty set.
    pub fn mark_initialized(&mut self) -> Result<(), ChainError> {
        if !self.flags.is_empty() {
            return Err(ChainError::invalid_state(format!(
                "context initialized twice (flags {:?})",
                self.flags
            )));
        }
        self.flags = InitFlags::CTX_INIT;
        Ok(())
    }

    pub fn mark_mac_key_set(&mut self) -> Result<(), ChainError> {
        self.set_guarded(InitFlags::HMAC_KEY_SET, "set MAC key")
    }

    pub fn mark_session_initialized(&mut self) -> Result<(), ChainError> {
        self.set_guarded(InitFlags::SESSION_INIT, "session init")
    }

    /// Header registered; `lanes` headers are now pending.
    pub fn mark_header_set(&mut self, lanes: usize) -> Result<(), ChainError> {
        self.set_guarded(InitFlags::TLS_HDR_SET, "set TLS header")?;
        if lanes > 1 {
            self.flags.insert(InitFlags::PPL_AADCTR_SET);
        }
        Ok(())
    }

    pub fn mark_pipeline_outputs(&mut self) -> Result<(), ChainError> {
        self.set_guarded(InitFlags::PPL_OBUF_SET, "set pipeline output buffers")
    }

    pub fn mark_pipeline_inputs(&mut self) -> Result<(), ChainError> {
        self.set_guarded(InitFlags::PPL_IBUF_SET, "set pipeline input buffers")
    }

    pub fn mark_pipeline_lens(&mut self) -> Result<(), ChainError> {
        self.set_guarded(InitFlags::PPL_BUF_LEN_SET, "set pipeline input lengths")
    }

    /// All three pipeline hand-offs are staged.
    pub fn pipeline_staged(&self) -> bool {
        self.flags.contains(InitFlags::PPL_STAGED)
    }

    /// Some but not all pipeline hand-offs are staged.
    pub fn pipeline_incomplete(&self) -> bool {
        self.flags.intersects(InitFlags::PPL_STAGED) && !self.pipeline_staged()
    }

    pub fn pipeline_used(&self) -> bool {
        self.contains(InitFlags::PPL_USED)
    }

    /// Consume the per-call flags. A pipelined call also consumes the staged
    /// buffers and is remembered in `PPL_USED`.
    pub fn end_call(&mut self, pipelined: bool) {
        self.flags.remove(InitFlags::TLS_HDR_SET | InitFlags::PPL_AADCTR_SET);
        if pipelined {
            self.flags.remove(InitFlags::PPL_STAGED);
            self.flags.insert(InitFlags::PPL_USED);
        }
    }

    pub fn reset(&mut self) {
        self.flags = InitFlags::empty();
    }

    fn set_guarded(&mut self, flag: InitFlags, op: &str) -> Result<(), ChainError> {
        self.require_initialized(op)?;
        self.flags.insert(flag);
        Ok(())
    }
}
