//! accelerator/types.rs
//! Session parameters, op descriptors and completions exchanged with an
//! accelerator.

use std::fmt;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::constants::{AES_IV_LEN, HMAC_KEY_SIZE};
use crate::crypto::MacAlg;
use crate::registry::{CipherInfo, Direction};
use crate::types::ChainError;
use crate::utils::{try_copy, try_zeroed};

#[derive(Debug, Error)]
pub enum AcceleratorError {
    #[error("cannot size session: {0}")]
    SessionSizing(String),

    #[error("cannot create session: {0}")]
    SessionCreate(String),

    #[error("cannot initialize session: {0}")]
    SessionInit(String),

    #[error("submission rejected: {0}")]
    Submit(String),

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("cannot remove session: {0}")]
    RemoveSession(String),

    #[error("unknown session {0}")]
    UnknownSession(u64),

    #[error("accelerator shut down")]
    Shutdown,
}

/// Order of the two primitives inside one chained operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOrder {
    /// MAC over header + plaintext, then encrypt payload + MAC + padding.
    HashThenCipher,
    /// Decrypt, then MAC over header + recovered plaintext.
    CipherThenHash,
}

/// Everything an accelerator needs to bind a chained session.
#[derive(Clone)]
pub struct SessionSetup {
    pub order: ChainOrder,
    pub direction: Direction,
    pub cipher_key: Zeroizing<Vec<u8>>,
    /// Always `HMAC_KEY_SIZE` bytes, zero padded.
    pub auth_key: Zeroizing<Vec<u8>>,
    pub auth_key_len: usize,
    pub mac: MacAlg,
    pub digest_len: usize,
    pub digest_appended: bool,
    pub verify_digest: bool,
}

impl SessionSetup {
    /// Direction-dependent template: encrypt hashes then ciphers with the
    /// digest appended, decrypt ciphers then hashes and verifies.
    pub fn template(
        info: &CipherInfo,
        direction: Direction,
        cipher_key: &[u8],
    ) -> Result<Self, ChainError> {
        let cipher_key = Zeroizing::new(try_copy(cipher_key)?);
        let auth_key = Zeroizing::new(try_zeroed(HMAC_KEY_SIZE)?);

        let (order, verify_digest) = match direction {
            Direction::Encrypt => (ChainOrder::HashThenCipher, false),
            Direction::Decrypt => (ChainOrder::CipherThenHash, true),
        };

        Ok(Self {
            order,
            direction,
            cipher_key,
            auth_key,
            auth_key_len: HMAC_KEY_SIZE,
            mac: info.mac,
            digest_len: info.digest_len,
            digest_appended: true,
            verify_digest,
        })
    }

    /// Effective MAC key.
    pub fn auth_key(&self) -> &[u8] {
        &self.auth_key[..self.auth_key_len.min(self.auth_key.len())]
    }
}

impl fmt::Debug for SessionSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSetup")
            .field("order", &self.order)
            .field("direction", &self.direction)
            .field("cipher_key", &"<redacted>")
            .field("auth_key", &"<redacted>")
            .field("auth_key_len", &self.auth_key_len)
            .field("mac", &self.mac)
            .field("digest_len", &self.digest_len)
            .field("digest_appended", &self.digest_appended)
            .field("verify_digest", &self.verify_digest)
            .finish()
    }
}

/// Opaque session identifier handed out by `Accelerator::create_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: u64,
}

/// One chained operation over one lane.
///
/// `buffer` is the lane's contiguous scratch: header region followed by the
/// payload. It travels with the op and comes back in the completion.
pub struct SymOp {
    pub lane: usize,
    pub iv: [u8; AES_IV_LEN],
    pub buffer: Vec<u8>,
    pub cipher_offset: usize,
    pub cipher_len: usize,
    pub hash_offset: usize,
    pub hash_len: usize,
    pub digest_len: usize,
    /// Per-op override; digests are checked only if the session also
    /// verifies.
    pub verify_digest: bool,
}

impl SymOp {
    /// Byte ranges fit inside the buffer, digest slot included.
    pub fn check_bounds(&self) -> Result<(), AcceleratorError> {
        let cipher_end = self.cipher_offset.checked_add(self.cipher_len);
        let digest_end = self
            .hash_offset
            .checked_add(self.hash_len)
            .and_then(|e| e.checked_add(self.digest_len));
        match (cipher_end, digest_end) {
            (Some(c), Some(d)) if c <= self.buffer.len() && d <= self.buffer.len() => Ok(()),
            _ => Err(AcceleratorError::Submit(format!(
                "op ranges exceed {}-byte buffer (cipher {}+{}, hash {}+{}+{})",
                self.buffer.len(),
                self.cipher_offset,
                self.cipher_len,
                self.hash_offset,
                self.hash_len,
                self.digest_len
            ))),
        }
    }
}

impl fmt::Debug for SymOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymOp")
            .field("lane", &self.lane)
            .field("buffer_len", &self.buffer.len())
            .field("cipher", &(self.cipher_offset, self.cipher_len))
            .field("hash", &(self.hash_offset, self.hash_len))
            .field("digest_len", &self.digest_len)
            .field("verify_digest", &self.verify_digest)
            .finish()
    }
}

/// Result of one `SymOp`, delivered to the `CompletionHandler`.
pub struct OpCompletion {
    pub lane: usize,
    pub status: Result<(), AcceleratorError>,
    /// Digest verification outcome; true when verification was not requested.
    pub verified: bool,
    pub buffer: Vec<u8>,
}

impl OpCompletion {
    /// Lane succeeded and passed verification.
    pub fn is_success(&self) -> bool {
        self.status.is_ok() && self.verified
    }
}

impl fmt::Debug for OpCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpCompletion")
            .field("lane", &self.lane)
            .field("status", &self.status)
            .field("verified", &self.verified)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

/// A submission the accelerator refused. The op is handed back so its
/// buffer can be scrubbed and reused.
#[derive(Debug)]
pub struct SubmitRejected {
    pub error: AcceleratorError,
    pub op: SymOp,
}

impl SubmitRejected {
    pub fn new(error: AcceleratorError, op: SymOp) -> Self {
        Self { error, op }
    }
}
