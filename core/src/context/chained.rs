//! context/chained.rs
//! Chained-cipher context: lifecycle and control operations.
//!
//! Design notes:
//! - One context per cipher stream; `&mut self` on every entry point keeps
//!   calls on a context strictly sequential.
//! - Key material lives in `SessionSetup` (zeroizing buffers) and the local
//!   window cipher; both are dropped on cleanup or failed init.
//! - Pipeline buffers are owned hand-offs, consumed by `process_pipeline`.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::accelerator::{Accelerator, AcceleratorError, SessionHandle, SessionSetup};
use crate::config::{EngineConfig, ThresholdTable};
use crate::constants::{AES_IV_LEN, HMAC_KEY_SIZE, TLS_VIRT_HDR_SIZE};
use crate::context::flags::{InitFlags, InitSequence};
use crate::crypto::CbcImpl;
use crate::fallback::SoftwareCipher;
use crate::pipeline::LanePool;
use crate::record::{aad_padding, TlsHeader};
use crate::registry::{ChainedCipherId, CipherInfo, Direction};
use crate::telemetry::{OffloadCounters, TelemetrySnapshot, TelemetryTimer};
use crate::types::{ChainError, ChainResult};

/// Pipeline hand-offs staged by the control operations.
#[derive(Debug, Default)]
pub(crate) struct PipelineStaging {
    pub(crate) outputs: Option<Vec<BytesMut>>,
    pub(crate) inputs: Option<Vec<Bytes>>,
    pub(crate) lens: Option<Vec<usize>>,
}

impl PipelineStaging {
    pub(crate) fn clear(&mut self) {
        self.outputs = None;
        self.inputs = None;
        self.lens = None;
    }
}

/// Result of a pipelined call: the output buffers handed back, and per lane
/// the bytes written (encrypt) or payload length (decrypt).
#[derive(Debug)]
pub struct PipelineOutput {
    pub outputs: Vec<BytesMut>,
    pub lens: Vec<usize>,
}

pub struct ChainedCipherCtx {
    pub(crate) cipher: ChainedCipherId,
    pub(crate) info: CipherInfo,
    pub(crate) accelerator: Arc<dyn Accelerator>,
    pub(crate) fallback: Box<dyn SoftwareCipher>,
    pub(crate) thresholds: Arc<ThresholdTable>,
    pub(crate) config: EngineConfig,

    pub(crate) direction: Direction,
    pub(crate) iv: [u8; AES_IV_LEN],
    pub(crate) setup: Option<SessionSetup>,
    /// Local key schedule for the decrypt-side padding window.
    pub(crate) window_cipher: Option<CbcImpl>,
    pub(crate) session: Option<SessionHandle>,
    pub(crate) session_ctx_size: usize,

    pub(crate) seq: InitSequence,
    /// Headers registered for the next call; its length is the AAD counter.
    pub(crate) headers: Vec<TlsHeader>,
    pub(crate) numpipes: usize,
    pub(crate) staging: PipelineStaging,
    pub(crate) pool: LanePool,

    pub(crate) counters: OffloadCounters,
    pub(crate) timer: TelemetryTimer,
}

impl ChainedCipherCtx {
    /// Uninitialized context; `init` must run before anything else.
    pub fn new(
        cipher: ChainedCipherId,
        accelerator: Arc<dyn Accelerator>,
        fallback: Box<dyn SoftwareCipher>,
        thresholds: Arc<ThresholdTable>,
        config: EngineConfig,
    ) -> Self {
        Self {
            cipher,
            info: cipher.info(),
            accelerator,
            fallback,
            thresholds,
            config,
            direction: Direction::Encrypt,
            iv: [0u8; AES_IV_LEN],
            setup: None,
            window_cipher: None,
            session: None,
            session_ctx_size: 0,
            seq: InitSequence::new(),
            headers: Vec::new(),
            numpipes: 1,
            staging: PipelineStaging::default(),
            pool: LanePool::new(),
            counters: OffloadCounters::default(),
            timer: TelemetryTimer::new(),
        }
    }

    /// Bind key, IV and direction. Any earlier state is released first.
    /// On failure nothing stays allocated and the context remains
    /// uninitialized.
    pub fn init(&mut self, key: &[u8], iv: Option<&[u8]>, direction: Direction) -> ChainResult<()> {
        // a failed session removal is already logged by cleanup
        let _ = self.cleanup();

        match self.try_init(key, iv, direction) {
            Ok(()) => {
                self.seq.mark_initialized()?;
                debug!(
                    cipher = self.info.name,
                    ?direction,
                    session_ctx_size = self.session_ctx_size,
                    "context initialized"
                );
                Ok(())
            }
            Err(e) => {
                warn!(cipher = self.info.name, error = %e, "context init failed");
                self.release();
                Err(e)
            }
        }
    }

    fn try_init(&mut self, key: &[u8], iv: Option<&[u8]>, direction: Direction) -> ChainResult<()> {
        if key.len() != self.info.key_len {
            return Err(ChainError::invalid_argument(format!(
                "{} needs a {}-byte key, got {}",
                self.info.name,
                self.info.key_len,
                key.len()
            )));
        }
        self.iv = match iv {
            Some(iv) => crate::crypto::iv_from_slice(iv)?,
            None => [0u8; AES_IV_LEN],
        };
        self.direction = direction;
        self.numpipes = 1;
        self.counters = OffloadCounters::default();
        self.timer = TelemetryTimer::new();

        self.headers.try_reserve_exact(self.config.max_pipelines)?;
        self.fallback.init(self.cipher, key, direction)?;

        let setup = SessionSetup::template(&self.info, direction, key)?;
        self.window_cipher = Some(CbcImpl::new(key)?);

        let size = self.accelerator.session_ctx_size(&setup)?;
        if size == 0 {
            return Err(AcceleratorError::SessionSizing("accelerator reported zero size".into()).into());
        }
        self.session_ctx_size = size;
        self.session = Some(self.accelerator.create_session(&setup)?);
        self.setup = Some(setup);
        Ok(())
    }

    /// Set the HMAC key and (re)initialize the accelerator session.
    pub fn set_mac_key(&mut self, key: &[u8]) -> ChainResult<()> {
        self.seq.require_initialized("set MAC key")?;
        let setup = self
            .setup
            .as_mut()
            .ok_or_else(|| ChainError::invalid_state("session parameters missing"))?;

        setup.auth_key[..].zeroize();
        if key.len() > HMAC_KEY_SIZE {
            setup.auth_key_len = setup.mac.hash_long_key(key, &mut setup.auth_key[..]);
        } else {
            setup.auth_key[..key.len()].copy_from_slice(key);
            setup.auth_key_len = key.len();
        }
        self.seq.mark_mac_key_set()?;

        let session = self
            .session
            .ok_or_else(|| ChainError::invalid_state("accelerator session missing"))?;
        if let Err(e) = self.accelerator.init_session(&session, setup) {
            warn!(session = session.id, error = %e, "session init failed");
            return Err(e.into());
        }
        self.seq.mark_session_initialized()?;
        self.fallback.set_mac_key(key)?;
        debug!(session = session.id, "MAC key set");
        Ok(())
    }

    /// Register the virtual header of the next lane. Returns MAC + padding
    /// room (encrypt) or the digest length (decrypt).
    pub fn set_tls_aad(&mut self, aad: &[u8]) -> ChainResult<usize> {
        self.seq.require_initialized("set TLS header")?;
        if aad.len() != TLS_VIRT_HDR_SIZE || self.headers.len() >= self.config.max_pipelines {
            warn!(len = aad.len(), pending = self.headers.len(), "TLS header rejected");
            return Err(ChainError::invalid_argument(format!(
                "TLS header of {} bytes with {} already pending",
                aad.len(),
                self.headers.len()
            )));
        }

        let header = TlsHeader::from_slice(aad)?;
        if !header.has_explicit_iv() && !self.headers.is_empty() {
            warn!(version = header.version(), "second header for a pre-1.1 record");
            return Err(ChainError::invalid_argument(
                "pipelining needs TLS 1.1 or later",
            ));
        }
        let framing = aad_padding(self.direction, &header, self.info.digest_len)?;

        self.headers.push(header);
        self.seq.mark_header_set(self.headers.len())?;
        Ok(framing.extra_len)
    }

    pub fn set_pipeline_output_bufs(&mut self, outputs: Vec<BytesMut>) -> ChainResult<()> {
        self.seq.require_initialized("set pipeline output buffers")?;
        self.numpipes = self.check_lanes(outputs.len(), "output buffers")?;
        self.staging.outputs = Some(outputs);
        self.seq.mark_pipeline_outputs()
    }

    pub fn set_pipeline_input_bufs(&mut self, inputs: Vec<Bytes>) -> ChainResult<()> {
        self.seq.require_initialized("set pipeline input buffers")?;
        self.numpipes = self.check_lanes(inputs.len(), "input buffers")?;
        self.staging.inputs = Some(inputs);
        self.seq.mark_pipeline_inputs()
    }

    pub fn set_pipeline_input_lens(&mut self, lens: Vec<usize>) -> ChainResult<()> {
        self.seq.require_initialized("set pipeline input lengths")?;
        self.numpipes = self.check_lanes(lens.len(), "input lengths")?;
        self.staging.lens = Some(lens);
        self.seq.mark_pipeline_lens()
    }

    fn check_lanes(&self, lanes: usize, what: &str) -> ChainResult<usize> {
        if lanes == 0 || lanes > self.config.max_pipelines {
            warn!(lanes, max = self.config.max_pipelines, "pipeline {} rejected", what);
            return Err(ChainError::invalid_argument(format!(
                "{} pipeline {} outside 1..={}",
                lanes, what, self.config.max_pipelines
            )));
        }
        Ok(lanes)
    }

    /// Release everything. Safe on a context that never finished `init`.
    /// Reports a failed session removal after all other state is gone.
    pub fn cleanup(&mut self) -> ChainResult<()> {
        let removed = match self.session.take() {
            Some(session) => self.accelerator.remove_session(&session).map_err(|e| {
                warn!(session = session.id, error = %e, "session removal failed");
                ChainError::from(e)
            }),
            None => Ok(()),
        };
        let was_init = self.seq.is_initialized();
        self.release();
        if was_init {
            self.timer.finish();
            debug!(cipher = self.info.name, "context cleaned up");
        }
        removed
    }

    /// Drop all key material and per-context state.
    fn release(&mut self) {
        self.fallback.cleanup();
        self.pool.clear();
        if let Some(session) = self.session.take() {
            if let Err(e) = self.accelerator.remove_session(&session) {
                warn!(session = session.id, error = %e, "session removal failed");
            }
        }
        self.setup = None;
        self.window_cipher = None;
        self.session_ctx_size = 0;
        self.iv.zeroize();
        self.headers.clear();
        self.staging.clear();
        self.numpipes = 1;
        self.seq.reset();
    }

    /// Initialize the session with the all-zero MAC key if no key was set.
    pub(crate) fn ensure_session(&mut self) -> ChainResult<()> {
        if self.seq.contains(InitFlags::SESSION_INIT) {
            return Ok(());
        }
        let (session, setup) = match (&self.session, &self.setup) {
            (Some(s), Some(p)) => (*s, p),
            _ => return Err(ChainError::invalid_state("accelerator session missing")),
        };
        self.accelerator.init_session(&session, setup)?;
        self.seq.mark_session_initialized()?;
        debug!(session = session.id, "session initialized with default MAC key");
        Ok(())
    }

    pub fn cipher(&self) -> ChainedCipherId {
        self.cipher
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Chain IV (rolled by TLS 1.0 and raw CBC records).
    pub fn iv(&self) -> &[u8; AES_IV_LEN] {
        &self.iv
    }

    pub fn init_flags(&self) -> InitFlags {
        self.seq.flags()
    }

    /// Headers registered and not yet consumed by a call.
    pub fn aad_count(&self) -> usize {
        self.headers.len()
    }

    /// Largest lane count any pipelined call has used.
    pub fn peak_lanes(&self) -> usize {
        self.pool.peak()
    }

    pub fn lane_capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn counters(&self) -> &OffloadCounters {
        &self.counters
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::from(&self.counters, &self.timer)
    }
}

impl Drop for ChainedCipherCtx {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
