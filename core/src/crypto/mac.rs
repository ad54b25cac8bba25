//! crypto/mac.rs
//! HMAC-SHA1 / HMAC-SHA256 for the chained ciphers.
//!
//! The hash input is always a list of slices (virtual header, payload) so the
//! callers never have to concatenate into a temporary buffer.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest as _, Sha256};

use crate::constants::{SHA1_DIGEST_LEN, SHA256_DIGEST_LEN};
use crate::crypto::types::CryptoError;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// MAC digest family of a chained cipher.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacAlg {
    Sha1,
    Sha256,
}

impl MacAlg {
    #[inline]
    pub fn digest_len(self) -> usize {
        match self {
            MacAlg::Sha1 => SHA1_DIGEST_LEN,
            MacAlg::Sha256 => SHA256_DIGEST_LEN,
        }
    }

    /// Hash an over-long MAC key down to one digest.
    /// Writes into `out[..digest_len]` and returns the digest length.
    pub fn hash_long_key(self, key: &[u8], out: &mut [u8]) -> usize {
        match self {
            MacAlg::Sha1 => {
                let d = Sha1::digest(key);
                out[..d.len()].copy_from_slice(&d);
                d.len()
            }
            MacAlg::Sha256 => {
                let d = Sha256::digest(key);
                out[..d.len()].copy_from_slice(&d);
                d.len()
            }
        }
    }

    /// HMAC over the concatenation of `parts`.
    pub fn compute(self, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
        match self {
            MacAlg::Sha1 => {
                let mut m = HmacSha1::new_from_slice(key)
                    .map_err(|_| CryptoError::Failure("HMAC-SHA1 key rejected".into()))?;
                for p in parts {
                    m.update(p);
                }
                Ok(m.finalize().into_bytes().to_vec())
            }
            MacAlg::Sha256 => {
                let mut m = HmacSha256::new_from_slice(key)
                    .map_err(|_| CryptoError::Failure("HMAC-SHA256 key rejected".into()))?;
                for p in parts {
                    m.update(p);
                }
                Ok(m.finalize().into_bytes().to_vec())
            }
        }
    }

    /// Constant-time verification of `expected` against HMAC over `parts`.
    pub fn verify(self, key: &[u8], parts: &[&[u8]], expected: &[u8]) -> Result<bool, CryptoError> {
        match self {
            MacAlg::Sha1 => {
                let mut m = HmacSha1::new_from_slice(key)
                    .map_err(|_| CryptoError::Failure("HMAC-SHA1 key rejected".into()))?;
                for p in parts {
                    m.update(p);
                }
                Ok(m.verify_slice(expected).is_ok())
            }
            MacAlg::Sha256 => {
                let mut m = HmacSha256::new_from_slice(key)
                    .map_err(|_| CryptoError::Failure("HMAC-SHA256 key rejected".into()))?;
                for p in parts {
                    m.update(p);
                }
                Ok(m.verify_slice(expected).is_ok())
            }
        }
    }
}
