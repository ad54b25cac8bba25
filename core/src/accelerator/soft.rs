//! accelerator/soft.rs
//! In-process accelerator backed by a crossbeam worker pool.
//!
//! Design notes:
//! - Each worker thread drains a shared job channel and runs one chained op
//!   at a time with `CbcImpl` + HMAC.
//! - Jobs carry an `Arc` of the session state captured at submit time, so a
//!   session removed while ops are in flight still completes them.
//! - Dropping the accelerator closes the channel and joins the workers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, trace, warn};

use super::{
    Accelerator,
    AcceleratorError,
    ChainOrder,
    CompletionHandler,
    OpCompletion,
    SessionHandle,
    SessionSetup,
    SubmitRejected,
    SymOp,
};
use crate::config::EngineConfig;
use crate::crypto::CbcImpl;

/// Bound session: parameters plus the expanded key schedule.
struct SessionState {
    setup: SessionSetup,
    cipher: CbcImpl,
}

struct Job {
    state: Arc<SessionState>,
    op: SymOp,
    handler: Arc<dyn CompletionHandler>,
}

type SessionMap = HashMap<u64, Option<Arc<SessionState>>>;

pub struct SoftAccelerator {
    sessions: Mutex<SessionMap>,
    next_id: AtomicU64,
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl SoftAccelerator {
    /// Pool sized to the host, leaving one core to the submitter.
    pub fn new() -> Self {
        Self::with_workers(num_cpus::get().saturating_sub(1).max(1))
    }

    /// Pool sized by `EngineConfig::accelerator_workers`, or to the host
    /// when unset.
    pub fn from_config(config: &EngineConfig) -> Self {
        match config.accelerator_workers {
            Some(workers) => Self::with_workers(workers),
            None => Self::new(),
        }
    }

    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = unbounded::<Job>();

        let handles = (0..workers)
            .map(|idx| {
                let rx = rx.clone();
                std::thread::spawn(move || worker_loop(idx, rx))
            })
            .collect();

        debug!(workers, "soft accelerator started");
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            tx: Some(tx),
            workers: handles,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Live sessions (created and not yet removed).
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|m| m.len()).unwrap_or(0)
    }

    fn lookup(&self, session: &SessionHandle) -> Result<Arc<SessionState>, AcceleratorError> {
        let map = self
            .sessions
            .lock()
            .map_err(|_| AcceleratorError::Submit("session table poisoned".into()))?;
        match map.get(&session.id) {
            Some(Some(state)) => Ok(state.clone()),
            Some(None) => Err(AcceleratorError::Submit(format!(
                "session {} not initialized",
                session.id
            ))),
            None => Err(AcceleratorError::UnknownSession(session.id)),
        }
    }
}

impl Default for SoftAccelerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SoftAccelerator {
    fn drop(&mut self) {
        // closing the channel ends every worker loop
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Accelerator for SoftAccelerator {
    fn session_ctx_size(&self, _setup: &SessionSetup) -> Result<usize, AcceleratorError> {
        Ok(std::mem::size_of::<SessionState>())
    }

    fn create_session(&self, setup: &SessionSetup) -> Result<SessionHandle, AcceleratorError> {
        // reject bad keys at creation rather than at first submit
        CbcImpl::new(&setup.cipher_key)
            .map_err(|e| AcceleratorError::SessionCreate(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .lock()
            .map_err(|_| AcceleratorError::SessionCreate("session table poisoned".into()))?
            .insert(id, None);
        debug!(session = id, "session created");
        Ok(SessionHandle { id })
    }

    fn init_session(
        &self,
        session: &SessionHandle,
        setup: &SessionSetup,
    ) -> Result<(), AcceleratorError> {
        let cipher = CbcImpl::new(&setup.cipher_key)
            .map_err(|e| AcceleratorError::SessionInit(e.to_string()))?;
        let state = Arc::new(SessionState { setup: setup.clone(), cipher });

        let mut map = self
            .sessions
            .lock()
            .map_err(|_| AcceleratorError::SessionInit("session table poisoned".into()))?;
        match map.get_mut(&session.id) {
            Some(slot) => {
                *slot = Some(state);
                debug!(session = session.id, order = ?setup.order, "session initialized");
                Ok(())
            }
            None => Err(AcceleratorError::UnknownSession(session.id)),
        }
    }

    fn submit(
        &self,
        session: &SessionHandle,
        op: SymOp,
        handler: Arc<dyn CompletionHandler>,
    ) -> Result<(), SubmitRejected> {
        let state = match self.lookup(session) {
            Ok(s) => s,
            Err(e) => return Err(SubmitRejected::new(e, op)),
        };
        if let Err(e) = op.check_bounds() {
            return Err(SubmitRejected::new(e, op));
        }
        let tx = match &self.tx {
            Some(tx) => tx,
            None => return Err(SubmitRejected::new(AcceleratorError::Shutdown, op)),
        };

        trace!(session = session.id, lane = op.lane, len = op.cipher_len, "op queued");
        tx.send(Job { state, op, handler })
            .map_err(|e| SubmitRejected::new(AcceleratorError::Shutdown, e.into_inner().op))
    }

    fn remove_session(&self, session: &SessionHandle) -> Result<(), AcceleratorError> {
        let removed = self
            .sessions
            .lock()
            .map_err(|_| AcceleratorError::RemoveSession("session table poisoned".into()))?
            .remove(&session.id);
        match removed {
            Some(_) => {
                debug!(session = session.id, "session removed");
                Ok(())
            }
            None => Err(AcceleratorError::UnknownSession(session.id)),
        }
    }
}

fn worker_loop(idx: usize, rx: Receiver<Job>) {
    while let Ok(Job { state, mut op, handler }) = rx.recv() {
        let lane = op.lane;
        let (status, verified) = match execute(&state, &mut op) {
            Ok(v) => (Ok(()), v),
            Err(e) => {
                warn!(worker = idx, lane, error = %e, "op failed");
                (Err(e), false)
            }
        };
        handler.on_complete(OpCompletion {
            lane,
            status,
            verified,
            buffer: op.buffer,
        });
    }
    trace!(worker = idx, "worker exiting");
}

/// Run one chained op in place. Returns the digest verification result.
fn execute(state: &SessionState, op: &mut SymOp) -> Result<bool, AcceleratorError> {
    let setup = &state.setup;
    if op.digest_len != setup.digest_len {
        return Err(AcceleratorError::Operation(format!(
            "digest length {} does not match session ({})",
            op.digest_len, setup.digest_len
        )));
    }
    let hash_end = op.hash_offset + op.hash_len;
    let digest_end = hash_end + op.digest_len;
    let cipher_range = op.cipher_offset..op.cipher_offset + op.cipher_len;
    let fail = |e: crate::crypto::CryptoError| AcceleratorError::Operation(e.to_string());

    match setup.order {
        ChainOrder::HashThenCipher => {
            let mac = setup
                .mac
                .compute(setup.auth_key(), &[&op.buffer[op.hash_offset..hash_end]])
                .map_err(fail)?;
            if setup.digest_appended {
                op.buffer[hash_end..digest_end].copy_from_slice(&mac[..op.digest_len]);
            }
            state
                .cipher
                .encrypt_in_place(&op.iv, &mut op.buffer[cipher_range])
                .map_err(fail)?;
            Ok(true)
        }
        ChainOrder::CipherThenHash => {
            state
                .cipher
                .decrypt_in_place(&op.iv, &mut op.buffer[cipher_range])
                .map_err(fail)?;
            if !(setup.verify_digest && op.verify_digest) {
                return Ok(true);
            }
            let (data, rest) = op.buffer.split_at(hash_end);
            setup
                .mac
                .verify(
                    setup.auth_key(),
                    &[&data[op.hash_offset..]],
                    &rest[..op.digest_len],
                )
                .map_err(fail)
        }
    }
}
