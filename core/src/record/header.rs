//! record/header.rs
//! Virtual TLS header (the AAD of a CBC-HMAC record).
//!
//! Layout (big-endian):
//!
//! ```text
//! 0..8   sequence number
//! 8      content type
//! 9..11  protocol version
//! 11..13 payload length
//! ```

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::constants::{TLS1_1_VERSION, TLS1_VERSION, TLS_VIRT_HDR_SIZE};
use crate::types::ChainError;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct TlsHeader([u8; TLS_VIRT_HDR_SIZE]);

impl TlsHeader {
    pub const LEN: usize = TLS_VIRT_HDR_SIZE;

    pub fn new(seq: u64, content_type: u8, version: u16, payload_len: u16) -> Self {
        let mut raw = [0u8; TLS_VIRT_HDR_SIZE];
        BigEndian::write_u64(&mut raw[0..8], seq);
        raw[8] = content_type;
        BigEndian::write_u16(&mut raw[9..11], version);
        BigEndian::write_u16(&mut raw[11..13], payload_len);
        Self(raw)
    }

    /// Exactly `TLS_VIRT_HDR_SIZE` bytes, otherwise `InvalidArgument`.
    pub fn from_slice(raw: &[u8]) -> Result<Self, ChainError> {
        let arr: [u8; TLS_VIRT_HDR_SIZE] = raw.try_into().map_err(|_| {
            ChainError::invalid_argument(format!(
                "TLS header must be {} bytes, got {}",
                TLS_VIRT_HDR_SIZE,
                raw.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Header used when the cipher is driven without TLS framing:
    /// protocol version 0 marks it invalid, payload length 0.
    pub fn synthesized() -> Self {
        Self([0u8; TLS_VIRT_HDR_SIZE])
    }

    #[inline]
    pub fn version(&self) -> u16 {
        BigEndian::read_u16(&self.0[9..11])
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        BigEndian::read_u16(&self.0[11..13]) as usize
    }

    /// Overwrite the length field with the low 16 bits of `len`.
    ///
    /// TLS records always fit; header-less buffers of any size only carry
    /// a synthesized header that is never verified.
    #[inline]
    pub fn set_payload_len(&mut self, len: usize) {
        BigEndian::write_u16(&mut self.0[11..13], (len & 0xffff) as u16);
    }

    /// Any real TLS version (1.0 and up).
    #[inline]
    pub fn is_tls(&self) -> bool {
        self.version() >= TLS1_VERSION
    }

    /// TLS 1.1+ records carry an explicit IV in front of the payload.
    #[inline]
    pub fn has_explicit_iv(&self) -> bool {
        self.version() >= TLS1_1_VERSION
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; TLS_VIRT_HDR_SIZE] {
        &self.0
    }
}

impl fmt::Debug for TlsHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsHeader")
            .field("seq", &BigEndian::read_u64(&self.0[0..8]))
            .field("type", &self.0[8])
            .field("version", &format_args!("0x{:04x}", self.version()))
            .field("len", &self.payload_len())
            .finish()
    }
}
