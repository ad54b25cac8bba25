//! context/process.rs
//! Record processing: single records and pipelined batches.
//!
//! Per call:
//! 1. validate state and pick the path (fallback, single lane, pipeline)
//! 2. frame every lane and submit one op per lane
//! 3. wait for the tracker, copy results out, reset per-call state
//!
//! Failures while submitting stop further submissions; lanes already in
//! flight are always drained before the call returns.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::accelerator::{CompletionHandler, SymOp};
use crate::constants::{AES_BLOCK_SIZE, AES_IV_LEN, HEADER_REGION_LEN, TLS_VIRT_HDR_SIZE};
use crate::context::chained::{ChainedCipherCtx, PipelineOutput};
use crate::crypto::iv_from_slice;
use crate::pipeline::{CompletionTracker, TrackerOutcome};
use crate::record::{decrypt_framing, encrypt_padding, mac_and_padding_len, TlsHeader};
use crate::registry::Direction;
use crate::telemetry::Stage;
use crate::types::{ChainError, ChainResult};

/// One lane's caller-side buffers for the duration of a call.
struct LaneIo<'a> {
    input: &'a [u8],
    output: &'a mut [u8],
    header: TlsHeader,
    /// Extra accelerator-visible bytes holding a MAC and padding that are
    /// never copied out (header-less records).
    discard: usize,
}

/// What a submitted lane needs for copy-out.
#[derive(Debug, Clone, Copy)]
struct LanePlan {
    /// Leading bytes of the output not produced by the op (explicit IV).
    skip: usize,
    copy_len: usize,
    /// Value reported to the caller for this lane.
    result_len: usize,
    roll_iv_from_output: bool,
}

impl ChainedCipherCtx {
    /// Process one record from `input` into `out`.
    ///
    /// Returns the bytes written when encrypting, the payload length net of
    /// explicit IV, MAC and padding when decrypting a TLS record, or the
    /// record length for header-less use. For TLS 1.1+ the payload starts
    /// after the explicit IV.
    pub fn process(&mut self, out: &mut [u8], input: &[u8]) -> ChainResult<usize> {
        let result = self.process_single(out, input);
        self.end_call(false);
        if let Err(e) = &result {
            warn!(cipher = self.info.name, error = %e, "process failed");
        }
        result
    }

    /// Process the staged pipeline: one record per lane, all lanes waited on
    /// together.
    pub fn process_pipeline(&mut self) -> ChainResult<PipelineOutput> {
        let staged = self.seq.pipeline_staged();
        let result = self.process_staged();
        self.end_call(staged);
        if let Err(e) = &result {
            warn!(cipher = self.info.name, error = %e, "pipelined process failed");
        }
        result
    }

    fn process_single(&mut self, out: &mut [u8], input: &[u8]) -> ChainResult<usize> {
        self.seq.require_initialized("process")?;
        if self.seq.pipeline_incomplete() {
            return Err(ChainError::invalid_state("pipeline not completely configured"));
        }
        if self.seq.pipeline_staged() {
            return Err(ChainError::invalid_state(
                "pipeline staged; use process_pipeline",
            ));
        }
        if input.len() % AES_BLOCK_SIZE != 0 || out.len() < input.len() {
            return Err(ChainError::invalid_argument(format!(
                "record of {} bytes into {}-byte output (block size {})",
                input.len(),
                out.len(),
                AES_BLOCK_SIZE
            )));
        }
        if self.headers.len() > 1 {
            return Err(ChainError::invalid_state(format!(
                "{} headers pending for a single record",
                self.headers.len()
            )));
        }
        self.ensure_session()?;
        self.numpipes = 1;

        if !self.config.small_packet_offload && input.len() <= self.thresholds.get(self.cipher) {
            if let Some(h) = self.headers.first() {
                self.fallback.set_tls_aad(h)?;
            }
            let n = self
                .timer
                .time(Stage::Fallback, || self.fallback.process(&mut self.iv, out, input));
            match &n {
                Ok(written) => self.counters.add_fallback(input.len(), *written),
                Err(ChainError::BadRecordMac) => self.counters.add_verify_failure(),
                Err(_) => {}
            }
            trace!(len = input.len(), "record served by software fallback");
            return n;
        }

        let lane = match self.headers.first() {
            Some(h) => LaneIo { input, output: out, header: *h, discard: 0 },
            None => LaneIo {
                input,
                output: out,
                header: TlsHeader::synthesized(),
                discard: mac_and_padding_len(input.len(), self.info.digest_len),
            },
        };
        let mut lanes = [lane];
        let lens = self.run_lanes(&mut lanes)?;
        Ok(lens[0])
    }

    fn process_staged(&mut self) -> ChainResult<PipelineOutput> {
        self.seq.require_initialized("process")?;
        if !self.seq.pipeline_staged() {
            return Err(ChainError::invalid_state("pipeline not completely configured"));
        }
        let (inputs, mut outputs, in_lens) = match (
            self.staging.inputs.take(),
            self.staging.outputs.take(),
            self.staging.lens.take(),
        ) {
            (Some(i), Some(o), Some(l)) => (i, o, l),
            _ => return Err(ChainError::invalid_state("pipeline buffers missing")),
        };

        let n = self.numpipes;
        if inputs.len() != n || outputs.len() != n || in_lens.len() != n {
            return Err(ChainError::invalid_argument(format!(
                "pipeline arrays disagree: {} inputs, {} outputs, {} lengths",
                inputs.len(),
                outputs.len(),
                in_lens.len()
            )));
        }
        if self.headers.len() != n {
            return Err(ChainError::invalid_state(format!(
                "TLS headers missing: {} of {} supplied",
                self.headers.len(),
                n
            )));
        }
        self.ensure_session()?;

        let mut lanes = Vec::with_capacity(n);
        for (i, ((input, output), len)) in
            inputs.iter().zip(outputs.iter_mut()).zip(in_lens.iter()).enumerate()
        {
            if *len > input.len() {
                return Err(ChainError::invalid_argument(format!(
                    "lane {} length {} exceeds its {}-byte input",
                    i,
                    len,
                    input.len()
                )));
            }
            if output.len() < *len {
                output.resize(*len, 0);
            }
            lanes.push(LaneIo {
                input: &input[..*len],
                output: &mut output[..*len],
                header: self.headers[i],
                discard: 0,
            });
        }

        let lens = self.run_lanes(&mut lanes)?;
        drop(lanes);
        debug!(lanes = n, "pipelined call complete");
        Ok(PipelineOutput { outputs, lens })
    }

    /// Frame, submit, wait and copy out every lane.
    fn run_lanes(&mut self, lanes: &mut [LaneIo<'_>]) -> ChainResult<Vec<usize>> {
        let n = lanes.len();
        self.pool.ensure_capacity(n)?;

        let tracker = Arc::new(CompletionTracker::new(n));
        let mut plans: Vec<LanePlan> = Vec::with_capacity(n);
        let mut pad_check: u32 = 1;
        let mut failure: Option<ChainError> = None;

        let t = Instant::now();
        for (i, lane) in lanes.iter().enumerate() {
            match self.submit_lane(i, n, lane, &tracker) {
                Ok((plan, pad_ok)) => {
                    pad_check &= pad_ok;
                    plans.push(plan);
                    tracker.note_submitted();
                }
                Err(e) => {
                    warn!(lane = i, error = %e, "lane not submitted");
                    failure = Some(e);
                    break;
                }
            }
        }
        if failure.is_some() {
            tracker.truncate_to_submitted();
        }
        self.timer.add_stage_time(Stage::Submit, t.elapsed());

        let t = Instant::now();
        tracker.wait(self.config.wait_strategy);
        self.timer.add_stage_time(Stage::Wait, t.elapsed());

        let outcome = tracker.finish();
        self.counters.add_offload(n, outcome.submitted, outcome.processed);
        if failure.is_some() {
            self.counters.add_submit_failure();
        }

        let t = Instant::now();
        let result = self.collect(lanes, &plans, outcome, failure, pad_check);
        self.timer.add_stage_time(Stage::CopyOut, t.elapsed());
        result
    }

    /// Build and submit the op of lane `i`. Returns its copy-out plan and
    /// the 1/0 padding check word.
    fn submit_lane(
        &mut self,
        i: usize,
        lanes: usize,
        lane: &LaneIo<'_>,
        tracker: &Arc<CompletionTracker>,
    ) -> ChainResult<(LanePlan, u32)> {
        let dlen = self.info.digest_len;
        let header = lane.header;
        let input: &[u8] = lane.input;
        let orig_len = input.len();

        let (iv, body, skip) = if header.has_explicit_iv() {
            if orig_len < AES_IV_LEN {
                return Err(ChainError::invalid_argument(format!(
                    "lane {} shorter than its explicit IV",
                    i
                )));
            }
            (iv_from_slice(&input[..AES_IV_LEN])?, &input[AES_IV_LEN..], AES_IV_LEN)
        } else {
            if lanes > 1 {
                return Err(ChainError::invalid_argument(format!(
                    "lane {}: pipelining needs TLS 1.1 or later",
                    i
                )));
            }
            (self.iv, input, 0)
        };
        let buf_len = body.len() + lane.discard;

        let (plen, pad_ok) = match self.direction {
            Direction::Encrypt => {
                let plen = if header.is_tls() {
                    header.payload_len().checked_sub(skip).ok_or_else(|| {
                        ChainError::invalid_argument("declared record length shorter than explicit IV")
                    })?
                } else {
                    orig_len
                };
                (plen, 1)
            }
            Direction::Decrypt if header.is_tls() => {
                let cipher = self
                    .window_cipher
                    .as_ref()
                    .ok_or_else(|| ChainError::invalid_state("cipher key missing"))?;
                let f = decrypt_framing(cipher, &iv, body, dlen)?;
                (f.payload_len, f.pad_ok)
            }
            Direction::Decrypt => (orig_len, 1),
        };
        let pad = match self.direction {
            Direction::Encrypt => Some(encrypt_padding(buf_len, plen, dlen)?),
            Direction::Decrypt => None,
        };

        *self.pool.iv_mut(i)? = iv;
        let mut buffer = self.pool.take_buffer(i, buf_len)?;

        let mut hash_header = header;
        hash_header.set_payload_len(plen);
        buffer[HEADER_REGION_LEN - TLS_VIRT_HDR_SIZE..HEADER_REGION_LEN]
            .copy_from_slice(hash_header.as_bytes());
        buffer[HEADER_REGION_LEN..HEADER_REGION_LEN + body.len()].copy_from_slice(body);

        match pad {
            Some(pad) => buffer[HEADER_REGION_LEN + plen + dlen..].fill(pad as u8),
            // the next record chains off the last ciphertext block
            None if skip == 0 && body.len() >= AES_BLOCK_SIZE => {
                self.iv = iv_from_slice(&body[body.len() - AES_BLOCK_SIZE..])?;
            }
            None => {}
        }

        let op = SymOp {
            lane: i,
            iv: *self.pool.iv_mut(i)?,
            buffer,
            cipher_offset: HEADER_REGION_LEN,
            cipher_len: buf_len,
            hash_offset: HEADER_REGION_LEN - TLS_VIRT_HDR_SIZE,
            hash_len: TLS_VIRT_HDR_SIZE + plen,
            digest_len: dlen,
            verify_digest: self.direction == Direction::Decrypt && header.is_tls(),
        };

        let session = self
            .session
            .ok_or_else(|| ChainError::invalid_state("accelerator session missing"))?;
        let handler: Arc<dyn CompletionHandler> = tracker.clone();
        if let Err(rejected) = self.accelerator.submit(&session, op, handler) {
            self.pool.restore(i, rejected.op.buffer);
            return Err(rejected.error.into());
        }
        trace!(lane = i, buf_len, "lane submitted");

        let result_len = match self.direction {
            Direction::Encrypt => orig_len,
            Direction::Decrypt => plen,
        };
        let plan = LanePlan {
            skip,
            copy_len: body.len(),
            result_len,
            roll_iv_from_output: self.direction == Direction::Encrypt && skip == 0,
        };
        Ok((plan, pad_ok))
    }

    /// Fold the call outcome, copy out on success and hand buffers back to
    /// the pool.
    fn collect(
        &mut self,
        lanes: &mut [LaneIo<'_>],
        plans: &[LanePlan],
        outcome: TrackerOutcome,
        failure: Option<ChainError>,
        pad_check: u32,
    ) -> ChainResult<Vec<usize>> {
        let mut op_error: Option<ChainError> = None;
        for completion in outcome.completions.iter().flatten() {
            if let Err(e) = &completion.status {
                op_error.get_or_insert_with(|| {
                    ChainError::Accelerator(crate::accelerator::AcceleratorError::Operation(
                        e.to_string(),
                    ))
                });
            }
        }
        let ok = failure.is_none()
            && op_error.is_none()
            && (outcome.verified as u32 & pad_check) == 1;

        let mut lens = Vec::with_capacity(plans.len());
        for (i, completion) in outcome.completions.into_iter().enumerate() {
            let Some(completion) = completion else { continue };
            if ok {
                if let (Some(lane), Some(plan)) = (lanes.get_mut(i), plans.get(i)) {
                    // explicit IV travels in clear
                    lane.output[..plan.skip].copy_from_slice(&lane.input[..plan.skip]);
                    let src = &completion.buffer[HEADER_REGION_LEN..HEADER_REGION_LEN + plan.copy_len];
                    lane.output[plan.skip..plan.skip + plan.copy_len].copy_from_slice(src);
                    if plan.roll_iv_from_output && plan.copy_len >= AES_BLOCK_SIZE {
                        self.iv = iv_from_slice(&src[plan.copy_len - AES_BLOCK_SIZE..])?;
                    }
                    lens.push(plan.result_len);
                }
            }
            self.pool.restore(i, completion.buffer);
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if let Some(e) = op_error {
            return Err(e);
        }
        if !ok {
            self.counters.add_verify_failure();
            return Err(ChainError::BadRecordMac);
        }
        let bytes_in: usize = lanes.iter().map(|l| l.input.len()).sum();
        let bytes_out: usize = lens.iter().sum();
        self.counters.add_bytes(bytes_in, bytes_out);
        Ok(lens)
    }

    /// Per-call reset: the AAD counter always returns to zero. A call that
    /// found the pipeline fully staged consumes it and raises the peak lane
    /// count, whatever its outcome.
    fn end_call(&mut self, pipelined: bool) {
        self.headers.clear();
        self.seq.end_call(pipelined);
        if pipelined {
            self.staging.clear();
            self.pool.record_use(self.numpipes);
            trace!(lanes = self.numpipes, peak = self.pool.peak(), "pipelined call ended");
        }
        self.numpipes = 1;
    }
}
