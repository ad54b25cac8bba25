//! Compile-time limits for the chained-cipher record engine.
//!
//! TLS values mirror the record layer (RFC 2246 / RFC 4346); accelerator
//! values describe the scratch layout handed to the offload device.

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// CBC IV length in bytes (one AES block).
pub const AES_IV_LEN: usize = 16;

/// Fixed size of the HMAC key buffer. Longer keys are hashed down first.
pub const HMAC_KEY_SIZE: usize = 64;

/// Virtual TLS header: seq(8) | type(1) | version(2 BE) | length(2 BE).
pub const TLS_VIRT_HDR_SIZE: usize = 13;

/// Largest padding value a CBC record may carry.
pub const TLS_MAX_PADDING_LENGTH: usize = 255;

pub const TLS1_VERSION: u16 = 0x0301;
pub const TLS1_1_VERSION: u16 = 0x0302;

/// Upper bound on lanes per pipelined call.
pub const MAX_PIPELINES: usize = 32;

/// Header scratch region per lane. The virtual header sits in its last
/// `TLS_VIRT_HDR_SIZE` bytes so header and payload are one contiguous span.
pub const HEADER_REGION_LEN: usize = 64;

/// Records at or below this many bytes go to the software fallback.
pub const SMALL_PACKET_THRESHOLD_DEFAULT: usize = 2048;

/// Chained cipher identifiers (stable registry values).
pub mod cipher_ids {
    pub const AES128_CBC_HMAC_SHA1: u16   = 0x0001;
    pub const AES128_CBC_HMAC_SHA256: u16 = 0x0002;
    pub const AES256_CBC_HMAC_SHA1: u16   = 0x0003;
    pub const AES256_CBC_HMAC_SHA256: u16 = 0x0004;
}

/// Digest sizes of the supported MACs.
pub const SHA1_DIGEST_LEN: usize = 20;
pub const SHA256_DIGEST_LEN: usize = 32;

const _: () = assert!(HEADER_REGION_LEN >= TLS_VIRT_HDR_SIZE);
