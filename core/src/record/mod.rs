//! Record framing for the chained ciphers.
//!
//! Responsibilities:
//! - Parse and rewrite the 13-byte virtual TLS header
//! - Compute payload and padding lengths in both directions
//! - Validate decrypted padding in constant time
//!
//! Non-responsibilities:
//! - Submitting work to the accelerator
//! - Owning scratch memory

pub mod header;
pub mod padding;

pub use header::TlsHeader;
pub use padding::{
    aad_padding,
    decrypt_framing,
    encrypt_padding,
    mac_and_padding_len,
    AadFraming,
    DecryptFraming,
};
