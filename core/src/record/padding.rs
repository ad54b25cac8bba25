//! record/padding.rs
//! Payload, MAC and padding arithmetic for CBC-HMAC records.
//!
//! Design notes:
//! - Encrypt-side framing is public data (the sender chooses it) and may
//!   branch freely.
//! - Decrypt-side framing touches the decrypted padding byte. Everything
//!   after the window decryption is branchless and goes through
//!   `crypto::constant_time`; the outcome is a 1/0 word the caller folds
//!   into its aggregate result at the very end.

use zeroize::Zeroize;

use crate::constants::{AES_BLOCK_SIZE, AES_IV_LEN, TLS_MAX_PADDING_LENGTH};
use crate::crypto::cbc::{iv_from_slice, CbcImpl};
use crate::crypto::constant_time as ct;
use crate::record::header::TlsHeader;
use crate::registry::Direction;
use crate::types::ChainError;

/// Largest decrypt window: max padding + length byte, block aligned.
const MAX_WINDOW: usize = TLS_MAX_PADDING_LENGTH + 1;

#[inline]
fn round_up_block(n: usize) -> usize {
    (n + AES_BLOCK_SIZE - 1) & !(AES_BLOCK_SIZE - 1)
}

/// Extra bytes a record of `len` payload bytes needs for its MAC and the
/// padding (including the length byte) that makes it block aligned.
#[inline]
pub fn mac_and_padding_len(len: usize, digest_len: usize) -> usize {
    ((len + digest_len + AES_BLOCK_SIZE) & !(AES_BLOCK_SIZE - 1)) - len
}

/// Result of registering one TLS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AadFraming {
    /// Declared payload length net of the explicit IV.
    pub payload_len: usize,
    /// Value returned to the TLS stack: MAC + padding bytes to reserve when
    /// encrypting, digest length when decrypting.
    pub extra_len: usize,
}

/// Framing arithmetic run when a TLS header is registered.
pub fn aad_padding(
    direction: Direction,
    header: &TlsHeader,
    digest_len: usize,
) -> Result<AadFraming, ChainError> {
    let mut len = header.payload_len();
    if header.has_explicit_iv() {
        len = len.checked_sub(AES_IV_LEN).ok_or_else(|| {
            ChainError::invalid_argument(format!(
                "declared record length {} shorter than explicit IV",
                len
            ))
        })?;
    }

    let extra_len = match direction {
        Direction::Encrypt => mac_and_padding_len(len, digest_len),
        Direction::Decrypt => digest_len,
    };
    Ok(AadFraming { payload_len: len, extra_len })
}

/// Padding length of an outgoing record of `buf_len` bytes (MAC and padding
/// included, explicit IV excluded) carrying `payload_len` bytes of data.
///
/// The padding occupies `buf_len - pad - 1 .. buf_len`, every byte equal to
/// `pad`.
pub fn encrypt_padding(
    buf_len: usize,
    payload_len: usize,
    digest_len: usize,
) -> Result<usize, ChainError> {
    if buf_len % AES_BLOCK_SIZE != 0 {
        return Err(ChainError::invalid_argument(format!(
            "record length {} is not a multiple of the block size",
            buf_len
        )));
    }
    let pad = (buf_len as isize) - (payload_len + digest_len) as isize - 1;
    if pad < 0 || pad as usize > TLS_MAX_PADDING_LENGTH {
        return Err(ChainError::invalid_argument(format!(
            "padding length {} out of range for record length {}",
            pad, buf_len
        )));
    }
    Ok(pad as usize)
}

/// Outcome of the decrypt-side padding check for one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptFraming {
    /// Payload length net of MAC and padding. Computed with a zero padding
    /// length when the check failed.
    pub payload_len: usize,
    /// 1 when the padding is well formed, 0 otherwise.
    pub pad_ok: u32,
}

/// Recover and validate the padding of an incoming record.
///
/// `body` is the ciphertext net of any explicit IV: payload, MAC and padding,
/// block aligned. Only the trailing window (at most 256 bytes) is decrypted,
/// with the preceding ciphertext block as IV or `chain_iv` when the window
/// starts at the front of the record.
pub fn decrypt_framing(
    cipher: &CbcImpl,
    chain_iv: &[u8; AES_IV_LEN],
    body: &[u8],
    digest_len: usize,
) -> Result<DecryptFraming, ChainError> {
    let buf_len = body.len();
    if buf_len % AES_BLOCK_SIZE != 0 {
        return Err(ChainError::invalid_argument(format!(
            "record length {} is not a multiple of the block size",
            buf_len
        )));
    }
    if buf_len < digest_len + 1 {
        return Err(ChainError::invalid_argument(format!(
            "record length {} cannot hold a {}-byte MAC",
            buf_len, digest_len
        )));
    }

    let window = if buf_len - digest_len <= TLS_MAX_PADDING_LENGTH {
        round_up_block(buf_len - digest_len)
    } else {
        MAX_WINDOW
    };
    let start = buf_len - window;
    let iv = if start == 0 {
        *chain_iv
    } else {
        iv_from_slice(&body[start - AES_BLOCK_SIZE..start])?
    };

    let mut block = [0u8; MAX_WINDOW];
    block[..window].copy_from_slice(&body[start..]);
    cipher.decrypt_in_place(&iv, &mut block[..window])?;

    let (pad_len, pad_ok) = check_padding(&block[..window], buf_len, digest_len);
    block.zeroize();

    Ok(DecryptFraming {
        payload_len: buf_len - (pad_len + 1 + digest_len),
        pad_ok,
    })
}

/// Branchless padding validation over a decrypted window.
///
/// Returns the padding length (zero when invalid) and the 1/0 check word.
/// The loop bound depends only on public lengths; the padding byte only ever
/// flows through masks.
fn check_padding(window: &[u8], buf_len: usize, digest_len: usize) -> (usize, u32) {
    let last = window.len() - 1;
    let mut pad = window[last] as u32;

    let mut max_pad = (buf_len - (digest_len + 1)) as u32;
    max_pad |= (TLS_MAX_PADDING_LENGTH as u32).wrapping_sub(max_pad) >> 24;
    max_pad &= TLS_MAX_PADDING_LENGTH as u32;

    let mut res: u8 = 0xff;
    // max_pad < window.len() always: the window covers buf_len - digest_len
    for j in 0..=max_pad as usize {
        let in_pad = ct::ge_8(pad, j as u32);
        let b = window[last - j];
        res &= !(in_pad & (pad as u8 ^ b));
    }

    let mut pad_ok = ct::mask_to_bit(ct::eq(0xff, res as u32));
    pad_ok &= ct::mask_to_bit(ct::ge(max_pad, pad));
    pad *= pad_ok;

    (pad as usize, pad_ok)
}
