//! pipeline/pool.rs
//! Per-lane scratch arena owned by one context.
//!
//! Design notes:
//! - One contiguous buffer per lane: `HEADER_REGION_LEN` bytes of header
//!   scratch followed by the payload, so header + payload hash as one span.
//! - Buffers are lent out for the duration of an accelerator op and handed
//!   back afterwards; their contents are scrubbed on return.
//! - Capacity only grows within the life of a context. `clear` releases
//!   everything at cleanup.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{AES_IV_LEN, HEADER_REGION_LEN, MAX_PIPELINES};
use crate::types::ChainError;

#[derive(Default, Zeroize, ZeroizeOnDrop)]
struct Lane {
    buffer: Vec<u8>,
    iv: [u8; AES_IV_LEN],
}

#[derive(Default)]
pub struct LanePool {
    lanes: Vec<Lane>,
    /// Largest lane count any call has used.
    peak: usize,
}

impl LanePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lanes currently allocated.
    pub fn capacity(&self) -> usize {
        self.lanes.len()
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Make room for `lanes` lanes. Existing lanes keep their allocations.
    pub fn ensure_capacity(&mut self, lanes: usize) -> Result<(), ChainError> {
        if lanes > MAX_PIPELINES {
            return Err(ChainError::invalid_argument(format!(
                "{} lanes exceed the maximum of {}",
                lanes, MAX_PIPELINES
            )));
        }
        if lanes <= self.lanes.len() {
            return Ok(());
        }
        self.lanes.try_reserve_exact(lanes - self.lanes.len())?;
        self.lanes.resize_with(lanes, Lane::default);
        Ok(())
    }

    /// Record that a call used `lanes` lanes.
    pub fn record_use(&mut self, lanes: usize) {
        self.peak = self.peak.max(lanes);
    }

    /// Move out lane `lane`'s buffer, zero filled, with room for the header
    /// region and `payload_len` bytes.
    pub fn take_buffer(&mut self, lane: usize, payload_len: usize) -> Result<Vec<u8>, ChainError> {
        let slot = self.slot(lane)?;
        let mut buf = std::mem::take(&mut slot.buffer);
        let len = HEADER_REGION_LEN + payload_len;

        buf.clear();
        buf.try_reserve_exact(len)?;
        buf.resize(len, 0);
        Ok(buf)
    }

    /// Return a buffer lent by `take_buffer`. Contents are scrubbed, the
    /// allocation is kept for the next call.
    pub fn restore(&mut self, lane: usize, mut buf: Vec<u8>) {
        buf.zeroize();
        if let Some(slot) = self.lanes.get_mut(lane) {
            slot.buffer = buf;
        }
    }

    pub fn iv_mut(&mut self, lane: usize) -> Result<&mut [u8; AES_IV_LEN], ChainError> {
        Ok(&mut self.slot(lane)?.iv)
    }

    /// Scrub and free every lane.
    pub fn clear(&mut self) {
        self.lanes.clear();
        self.lanes.shrink_to_fit();
        self.peak = 0;
    }

    fn slot(&mut self, lane: usize) -> Result<&mut Lane, ChainError> {
        let cap = self.lanes.len();
        self.lanes.get_mut(lane).ok_or_else(|| {
            ChainError::invalid_state(format!("lane {} beyond pool capacity {}", lane, cap))
        })
    }
}
