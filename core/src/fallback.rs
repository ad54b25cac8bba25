//! fallback.rs
//! Software path for records below the offload threshold.
//!
//! Design notes:
//! - `CbcHmacSoftware` produces exactly the record layout of the accelerator
//!   path: explicit IV copied through for TLS 1.1+, MAC then padding, one CBC
//!   pass keyed by the explicit or chained IV.
//! - The chain IV belongs to the context and is lent per call, so records
//!   can alternate between paths without losing CBC state.
//! - Padding is checked with the same branchless codec as the offload path;
//!   padding and MAC failures collapse into `BadRecordMac`.

use zeroize::{Zeroize, Zeroizing};

use crate::constants::{AES_BLOCK_SIZE, AES_IV_LEN, HMAC_KEY_SIZE};
use crate::crypto::cbc::{iv_from_slice, CbcImpl};
use crate::record::{decrypt_framing, encrypt_padding, TlsHeader};
use crate::registry::{CipherInfo, ChainedCipherId, Direction};
use crate::types::{ChainError, ChainResult};
use crate::utils::try_zeroed;

pub trait SoftwareCipher: Send {
    fn init(&mut self, cipher: ChainedCipherId, key: &[u8], direction: Direction) -> ChainResult<()>;

    fn set_mac_key(&mut self, key: &[u8]) -> ChainResult<()>;

    /// Register the header of the next record. Returns the same value as the
    /// context: MAC + padding room when encrypting, digest length when
    /// decrypting.
    fn set_tls_aad(&mut self, header: &TlsHeader) -> ChainResult<usize>;

    /// Process one record. Returns bytes written when encrypting, payload
    /// length when decrypting.
    fn process(
        &mut self,
        iv: &mut [u8; AES_IV_LEN],
        out: &mut [u8],
        input: &[u8],
    ) -> ChainResult<usize>;

    fn cleanup(&mut self);
}

struct Keys {
    info: CipherInfo,
    direction: Direction,
    cipher: CbcImpl,
    mac_key: Zeroizing<Vec<u8>>,
    mac_key_len: usize,
}

#[derive(Default)]
pub struct CbcHmacSoftware {
    keys: Option<Keys>,
    header: Option<TlsHeader>,
}

impl CbcHmacSoftware {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> ChainResult<&Keys> {
        self.keys
            .as_ref()
            .ok_or_else(|| ChainError::invalid_state("software cipher not initialized"))
    }
}

impl SoftwareCipher for CbcHmacSoftware {
    fn init(&mut self, cipher: ChainedCipherId, key: &[u8], direction: Direction) -> ChainResult<()> {
        let info = cipher.info();
        if key.len() != info.key_len {
            return Err(ChainError::invalid_argument(format!(
                "{} needs a {}-byte key, got {}",
                info.name,
                info.key_len,
                key.len()
            )));
        }
        let mac_key = try_zeroed(HMAC_KEY_SIZE)?;

        self.keys = Some(Keys {
            info,
            direction,
            cipher: CbcImpl::new(key)?,
            mac_key: Zeroizing::new(mac_key),
            mac_key_len: HMAC_KEY_SIZE,
        });
        self.header = None;
        Ok(())
    }

    fn set_mac_key(&mut self, key: &[u8]) -> ChainResult<()> {
        let keys = self
            .keys
            .as_mut()
            .ok_or_else(|| ChainError::invalid_state("software cipher not initialized"))?;
        keys.mac_key[..].zeroize();
        if key.len() > HMAC_KEY_SIZE {
            keys.mac_key_len = keys.info.mac.hash_long_key(key, &mut keys.mac_key[..]);
        } else {
            keys.mac_key[..key.len()].copy_from_slice(key);
            keys.mac_key_len = key.len();
        }
        Ok(())
    }

    fn set_tls_aad(&mut self, header: &TlsHeader) -> ChainResult<usize> {
        let keys = self.keys()?;
        let framing = crate::record::aad_padding(keys.direction, header, keys.info.digest_len)?;
        self.header = Some(*header);
        Ok(framing.extra_len)
    }

    fn process(
        &mut self,
        iv: &mut [u8; AES_IV_LEN],
        out: &mut [u8],
        input: &[u8],
    ) -> ChainResult<usize> {
        let header = self.header.take();
        let keys = self.keys()?;
        if input.len() % AES_BLOCK_SIZE != 0 || out.len() < input.len() {
            return Err(ChainError::invalid_argument(format!(
                "record of {} bytes into {}-byte output",
                input.len(),
                out.len()
            )));
        }

        match header.filter(|h| h.is_tls()) {
            None => raw_cbc(keys, iv, out, input),
            Some(h) => match keys.direction {
                Direction::Encrypt => seal_record(keys, &h, iv, out, input),
                Direction::Decrypt => open_record(keys, &h, iv, out, input),
            },
        }
    }

    fn cleanup(&mut self) {
        self.keys = None;
        self.header = None;
    }
}

/// Plain CBC over the whole buffer, IV rolled to the last ciphertext block.
fn raw_cbc(
    keys: &Keys,
    iv: &mut [u8; AES_IV_LEN],
    out: &mut [u8],
    input: &[u8],
) -> ChainResult<usize> {
    let len = input.len();
    out[..len].copy_from_slice(input);
    let last = match keys.direction {
        Direction::Encrypt => keys.cipher.encrypt_in_place(iv, &mut out[..len])?,
        Direction::Decrypt => keys.cipher.decrypt_in_place(iv, &mut out[..len])?,
    };
    if len > 0 {
        *iv = last;
    }
    Ok(len)
}

/// Split an explicit IV off the front of a TLS 1.1+ record.
fn record_iv(
    header: &TlsHeader,
    chain_iv: &[u8; AES_IV_LEN],
    input: &[u8],
) -> ChainResult<([u8; AES_IV_LEN], usize)> {
    if !header.has_explicit_iv() {
        return Ok((*chain_iv, 0));
    }
    if input.len() < AES_IV_LEN {
        return Err(ChainError::invalid_argument("record shorter than its explicit IV"));
    }
    Ok((iv_from_slice(&input[..AES_IV_LEN])?, AES_IV_LEN))
}

fn seal_record(
    keys: &Keys,
    header: &TlsHeader,
    chain_iv: &mut [u8; AES_IV_LEN],
    out: &mut [u8],
    input: &[u8],
) -> ChainResult<usize> {
    let (iv, off) = record_iv(header, chain_iv, input)?;
    let dlen = keys.info.digest_len;
    let buf_len = input.len() - off;
    let plen = header.payload_len().checked_sub(off).ok_or_else(|| {
        ChainError::invalid_argument("declared record length shorter than explicit IV")
    })?;
    let pad = encrypt_padding(buf_len, plen, dlen)?;

    out[..input.len()].copy_from_slice(input);
    let body = &mut out[off..input.len()];

    let mut mac_hdr = *header;
    mac_hdr.set_payload_len(plen);
    let mac = keys
        .info
        .mac
        .compute(&keys.mac_key[..keys.mac_key_len], &[mac_hdr.as_bytes(), &body[..plen]])?;
    body[plen..plen + dlen].copy_from_slice(&mac[..dlen]);
    body[plen + dlen..].fill(pad as u8);

    let last = keys.cipher.encrypt_in_place(&iv, body)?;
    if off == 0 {
        *chain_iv = last;
    }
    Ok(input.len())
}

fn open_record(
    keys: &Keys,
    header: &TlsHeader,
    chain_iv: &mut [u8; AES_IV_LEN],
    out: &mut [u8],
    input: &[u8],
) -> ChainResult<usize> {
    let (iv, off) = record_iv(header, chain_iv, input)?;
    let dlen = keys.info.digest_len;
    let framing = decrypt_framing(&keys.cipher, &iv, &input[off..], dlen)?;
    let plen = framing.payload_len;

    out[..input.len()].copy_from_slice(input);
    let body = &mut out[off..input.len()];
    let last = keys.cipher.decrypt_in_place(&iv, body)?;
    if off == 0 {
        *chain_iv = last;
    }

    let mut mac_hdr = *header;
    mac_hdr.set_payload_len(plen);
    let (data, tail) = body.split_at(plen);
    let mac_ok = keys.info.mac.verify(
        &keys.mac_key[..keys.mac_key_len],
        &[mac_hdr.as_bytes(), data],
        &tail[..dlen],
    )?;

    if (framing.pad_ok & mac_ok as u32) == 0 {
        out[..input.len()].zeroize();
        return Err(ChainError::BadRecordMac);
    }
    Ok(plen)
}
