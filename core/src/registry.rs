//! registry.rs
//! Chained cipher registry: identifiers, key sizes and digest selection.
//!
//! Design notes:
//! - Identifiers are stable `u16` values; they key the threshold table.
//! - Every cipher is AES-CBC with a 16-byte block and IV; only key size and
//!   MAC digest vary.

use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::constants::{
    cipher_ids, AES_BLOCK_SIZE, AES_IV_LEN, SHA1_DIGEST_LEN, SHA256_DIGEST_LEN,
};
use crate::crypto::MacAlg;
use crate::types::ChainError;
use crate::utils::enum_name_or_hex;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
pub enum ChainedCipherId {
    Aes128CbcHmacSha1   = cipher_ids::AES128_CBC_HMAC_SHA1,
    Aes128CbcHmacSha256 = cipher_ids::AES128_CBC_HMAC_SHA256,
    Aes256CbcHmacSha1   = cipher_ids::AES256_CBC_HMAC_SHA1,
    Aes256CbcHmacSha256 = cipher_ids::AES256_CBC_HMAC_SHA256,
}

impl ChainedCipherId {
    pub const ALL: [ChainedCipherId; 4] = [
        ChainedCipherId::Aes128CbcHmacSha1,
        ChainedCipherId::Aes128CbcHmacSha256,
        ChainedCipherId::Aes256CbcHmacSha1,
        ChainedCipherId::Aes256CbcHmacSha256,
    ];

    pub fn from_raw(raw: u16) -> Result<Self, ChainError> {
        Self::try_from_primitive(raw).map_err(|_| {
            ChainError::invalid_argument(format!(
                "unsupported chained cipher: {}",
                enum_name_or_hex::<ChainedCipherId>(raw)
            ))
        })
    }

    pub fn info(self) -> CipherInfo {
        cipher_info(self)
    }
}

/// Static parameters of one chained cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherInfo {
    pub id: ChainedCipherId,
    pub name: &'static str,
    pub key_len: usize,
    pub block_size: usize,
    pub iv_len: usize,
    pub mac: MacAlg,
    pub digest_len: usize,
}

pub fn cipher_info(id: ChainedCipherId) -> CipherInfo {
    let (name, key_len, mac) = match id {
        ChainedCipherId::Aes128CbcHmacSha1 => ("AES-128-CBC-HMAC-SHA1", 16, MacAlg::Sha1),
        ChainedCipherId::Aes128CbcHmacSha256 => ("AES-128-CBC-HMAC-SHA256", 16, MacAlg::Sha256),
        ChainedCipherId::Aes256CbcHmacSha1 => ("AES-256-CBC-HMAC-SHA1", 32, MacAlg::Sha1),
        ChainedCipherId::Aes256CbcHmacSha256 => ("AES-256-CBC-HMAC-SHA256", 32, MacAlg::Sha256),
    };
    let digest_len = match mac {
        MacAlg::Sha1 => SHA1_DIGEST_LEN,
        MacAlg::Sha256 => SHA256_DIGEST_LEN,
    };
    CipherInfo {
        id,
        name,
        key_len,
        block_size: AES_BLOCK_SIZE,
        iv_len: AES_IV_LEN,
        mac,
        digest_len,
    }
}

/// Cipher direction of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    pub fn from_enc_flag(enc: bool) -> Self {
        if enc { Direction::Encrypt } else { Direction::Decrypt }
    }

    pub fn is_encrypt(self) -> bool {
        matches!(self, Direction::Encrypt)
    }
}
