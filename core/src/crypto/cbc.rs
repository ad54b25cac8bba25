//! crypto/cbc.rs
//! AES-CBC over block-aligned buffers, in place.
//!
//! Design notes:
//! - No padding is applied here; record padding is framed by the codec.
//! - Both directions return the last ciphertext block so callers can roll the
//!   chain IV (TLS 1.0 records and raw CBC streams).
//! - Round keys are zeroized on drop (`aes` built with `zeroize`).

use std::fmt;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};

use crate::constants::{AES_BLOCK_SIZE, AES_IV_LEN};
use crate::crypto::types::{CryptoError, KEY_LEN_16, KEY_LEN_32};

/// AES key schedule selected by key length.
#[derive(Clone)]
pub enum CbcImpl {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl fmt::Debug for CbcImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CbcImpl::Aes128(_) => f.write_str("CbcImpl::Aes128(..)"),
            CbcImpl::Aes256(_) => f.write_str("CbcImpl::Aes256(..)"),
        }
    }
}

impl CbcImpl {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            KEY_LEN_16 => Aes128::new_from_slice(key)
                .map(CbcImpl::Aes128)
                .map_err(|_| CryptoError::InvalidKeyLen { expected: KEY_LEN_16, actual: key.len() }),
            KEY_LEN_32 => Aes256::new_from_slice(key)
                .map(CbcImpl::Aes256)
                .map_err(|_| CryptoError::InvalidKeyLen { expected: KEY_LEN_32, actual: key.len() }),
            other => Err(CryptoError::InvalidKeyLen { expected: KEY_LEN_32, actual: other }),
        }
    }

    #[inline]
    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            CbcImpl::Aes128(c) => c.encrypt_block(block),
            CbcImpl::Aes256(c) => c.encrypt_block(block),
        }
    }

    #[inline]
    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            CbcImpl::Aes128(c) => c.decrypt_block(block),
            CbcImpl::Aes256(c) => c.decrypt_block(block),
        }
    }

    /// CBC-encrypt `buf` in place. Returns the last ciphertext block.
    pub fn encrypt_in_place(
        &self,
        iv: &[u8; AES_IV_LEN],
        buf: &mut [u8],
    ) -> Result<[u8; AES_BLOCK_SIZE], CryptoError> {
        check_aligned(buf.len())?;

        let mut chain = *iv;
        for chunk in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
            for (b, c) in chunk.iter_mut().zip(chain.iter()) {
                *b ^= *c;
            }
            self.encrypt_block(chunk);
            chain.copy_from_slice(chunk);
        }
        Ok(chain)
    }

    /// CBC-decrypt `buf` in place. Returns the last *ciphertext* block.
    pub fn decrypt_in_place(
        &self,
        iv: &[u8; AES_IV_LEN],
        buf: &mut [u8],
    ) -> Result<[u8; AES_BLOCK_SIZE], CryptoError> {
        check_aligned(buf.len())?;

        let mut chain = *iv;
        let mut next = [0u8; AES_BLOCK_SIZE];
        for chunk in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
            next.copy_from_slice(chunk);
            self.decrypt_block(chunk);
            for (b, c) in chunk.iter_mut().zip(chain.iter()) {
                *b ^= *c;
            }
            chain = next;
        }
        Ok(chain)
    }
}

#[inline]
fn check_aligned(len: usize) -> Result<(), CryptoError> {
    if len % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::Misaligned { len, block: AES_BLOCK_SIZE });
    }
    Ok(())
}

/// Copy a 16-byte IV out of a slice.
pub fn iv_from_slice(iv: &[u8]) -> Result<[u8; AES_IV_LEN], CryptoError> {
    iv.try_into().map_err(|_| CryptoError::InvalidIvLen {
        expected: AES_IV_LEN,
        actual: iv.len(),
    })
}
