// Shared fixtures for the integration suites.
//
// * deterministic keys and IVs per cipher
// * TLS header and record builders (seal / open helpers)
// * `ScriptedAccelerator`: wraps `SoftAccelerator`, counts calls and
//   injects submit / session failures on demand

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use cipher_offload::accelerator::{
    Accelerator, AcceleratorError, CompletionHandler, SessionHandle, SessionSetup,
    SoftAccelerator, SubmitRejected, SymOp,
};
use cipher_offload::config::EngineConfig;
use cipher_offload::constants::AES_IV_LEN;
use cipher_offload::context::ChainedCipherCtx;
use cipher_offload::fallback::CbcHmacSoftware;
use cipher_offload::record::TlsHeader;
use cipher_offload::registry::{ChainedCipherId, Direction};
use cipher_offload::types::ChainError;

pub const TLS1_0: u16 = 0x0301;
pub const TLS1_2: u16 = 0x0303;
pub const APPLICATION_DATA: u8 = 23;

pub const CHAIN_IV: [u8; AES_IV_LEN] = [0x42; AES_IV_LEN];
pub const MAC_KEY: &[u8] = b"0123456789abcdef0123";

// ----------------------------------------------------------------------
// Logging
// ----------------------------------------------------------------------

static INIT: Once = Once::new();

/// Route `tracing` output to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

pub fn cipher_key(id: ChainedCipherId) -> Vec<u8> {
    (0..id.info().key_len).map(|i| (i as u8).wrapping_mul(7) ^ 0x5a).collect()
}

pub fn explicit_iv(seed: u8) -> [u8; AES_IV_LEN] {
    let mut iv = [0u8; AES_IV_LEN];
    for (i, b) in iv.iter_mut().enumerate() {
        *b = seed.wrapping_add(i as u8).wrapping_mul(31);
    }
    iv
}

pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_add(seed)).collect()
}

pub fn header(seq: u64, version: u16, len: usize) -> [u8; 13] {
    *TlsHeader::new(seq, APPLICATION_DATA, version, len as u16).as_bytes()
}

pub fn soft() -> Arc<SoftAccelerator> {
    Arc::new(SoftAccelerator::with_workers(2))
}

/// Every record goes to the accelerator.
pub fn offload_config() -> EngineConfig {
    EngineConfig { small_packet_offload: true, ..EngineConfig::default() }
}

/// Every record up to 64 KiB stays in software.
pub fn fallback_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    for id in ChainedCipherId::ALL {
        cfg.thresholds.insert(id as u16, 64 * 1024);
    }
    cfg
}

/// Context with key, chain IV and MAC key set.
pub fn context(
    id: ChainedCipherId,
    direction: Direction,
    accel: Arc<dyn Accelerator>,
    config: EngineConfig,
) -> ChainedCipherCtx {
    let mut ctx = bare_context(id, accel, config);
    ctx.init(&cipher_key(id), Some(&CHAIN_IV), direction).unwrap();
    ctx.set_mac_key(MAC_KEY).unwrap();
    ctx
}

/// Context that has not been initialized.
pub fn bare_context(
    id: ChainedCipherId,
    accel: Arc<dyn Accelerator>,
    config: EngineConfig,
) -> ChainedCipherCtx {
    let thresholds = config.threshold_table().unwrap();
    ChainedCipherCtx::new(id, accel, Box::new(CbcHmacSoftware::new()), thresholds, config)
}

// ----------------------------------------------------------------------
// Record helpers
// ----------------------------------------------------------------------

/// Plaintext record as the TLS stack hands it to an encrypting context:
/// explicit IV (1.1+), payload, then room for MAC and padding.
pub fn plaintext_record(version: u16, iv: &[u8; AES_IV_LEN], data: &[u8], extra: usize) -> Vec<u8> {
    let mut rec = Vec::new();
    if version >= 0x0302 {
        rec.extend_from_slice(iv);
    }
    rec.extend_from_slice(data);
    rec.resize(rec.len() + extra, 0);
    rec
}

/// Declared length of an outgoing record: explicit IV plus payload.
pub fn declared_len(version: u16, data_len: usize) -> usize {
    if version >= 0x0302 {
        AES_IV_LEN + data_len
    } else {
        data_len
    }
}

pub fn seal(
    ctx: &mut ChainedCipherCtx,
    seq: u64,
    version: u16,
    iv: &[u8; AES_IV_LEN],
    data: &[u8],
) -> Vec<u8> {
    let extra = ctx
        .set_tls_aad(&header(seq, version, declared_len(version, data.len())))
        .unwrap();
    let rec = plaintext_record(version, iv, data, extra);
    let mut out = vec![0u8; rec.len()];
    let n = ctx.process(&mut out, &rec).unwrap();
    assert_eq!(n, rec.len());
    out
}

/// Decrypt one record; returns the payload net of explicit IV, MAC and
/// padding.
pub fn open(
    ctx: &mut ChainedCipherCtx,
    seq: u64,
    version: u16,
    record: &[u8],
) -> Result<Vec<u8>, ChainError> {
    ctx.set_tls_aad(&header(seq, version, record.len()))?;
    let mut out = vec![0u8; record.len()];
    let n = ctx.process(&mut out, record)?;
    let off = if version >= 0x0302 { AES_IV_LEN } else { 0 };
    Ok(out[off..off + n].to_vec())
}

// ----------------------------------------------------------------------
// Scripted accelerator
// ----------------------------------------------------------------------

/// `SoftAccelerator` with call counters and injectable failures.
pub struct ScriptedAccelerator {
    inner: SoftAccelerator,
    /// Submissions attempted.
    pub submits: AtomicUsize,
    /// Submissions accepted by the inner accelerator.
    pub accepted: AtomicUsize,
    pub sessions_created: AtomicUsize,
    pub sessions_removed: AtomicUsize,
    /// Zero-based submit index from which submissions are rejected.
    fail_submit_from: Option<usize>,
    fail_session_init: AtomicBool,
    zero_ctx_size: bool,
}

impl ScriptedAccelerator {
    pub fn new() -> Self {
        Self {
            inner: SoftAccelerator::with_workers(2),
            submits: AtomicUsize::new(0),
            accepted: AtomicUsize::new(0),
            sessions_created: AtomicUsize::new(0),
            sessions_removed: AtomicUsize::new(0),
            fail_submit_from: None,
            fail_session_init: AtomicBool::new(false),
            zero_ctx_size: false,
        }
    }

    pub fn failing_submit_from(k: usize) -> Self {
        Self { fail_submit_from: Some(k), ..Self::new() }
    }

    pub fn zero_ctx_size() -> Self {
        Self { zero_ctx_size: true, ..Self::new() }
    }

    pub fn fail_session_init(&self, fail: bool) {
        self.fail_session_init.store(fail, Ordering::SeqCst);
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn live_sessions(&self) -> usize {
        self.inner.session_count()
    }
}

impl Accelerator for ScriptedAccelerator {
    fn session_ctx_size(&self, setup: &SessionSetup) -> Result<usize, AcceleratorError> {
        if self.zero_ctx_size {
            return Ok(0);
        }
        self.inner.session_ctx_size(setup)
    }

    fn create_session(&self, setup: &SessionSetup) -> Result<SessionHandle, AcceleratorError> {
        let s = self.inner.create_session(setup)?;
        self.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(s)
    }

    fn init_session(
        &self,
        session: &SessionHandle,
        setup: &SessionSetup,
    ) -> Result<(), AcceleratorError> {
        if self.fail_session_init.load(Ordering::SeqCst) {
            return Err(AcceleratorError::SessionInit("injected".into()));
        }
        self.inner.init_session(session, setup)
    }

    fn submit(
        &self,
        session: &SessionHandle,
        op: SymOp,
        handler: Arc<dyn CompletionHandler>,
    ) -> Result<(), SubmitRejected> {
        let k = self.submits.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit_from.map_or(false, |f| k >= f) {
            return Err(SubmitRejected::new(AcceleratorError::Submit("injected".into()), op));
        }
        self.inner.submit(session, op, handler)?;
        self.accepted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_session(&self, session: &SessionHandle) -> Result<(), AcceleratorError> {
        self.inner.remove_session(session)?;
        self.sessions_removed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
