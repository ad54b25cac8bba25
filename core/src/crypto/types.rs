use std::fmt;

/// AES-128 key length.
pub const KEY_LEN_16: usize = 16;

/// AES-256 key length.
pub const KEY_LEN_32: usize = 32;

#[derive(Debug)]
pub enum CryptoError {
    /// Invalid key length provided to cipher.
    InvalidKeyLen { expected: usize, actual: usize },

    /// IV length mismatch (must be one AES block).
    InvalidIvLen { expected: usize, actual: usize },

    /// Buffer is not a whole number of cipher blocks.
    Misaligned { len: usize, block: usize },

    /// General runtime error with context.
    Failure(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CryptoError::*;
        match self {
            InvalidKeyLen { expected, actual } =>
                write!(f, "invalid key length: expected={}, actual={}", expected, actual),
            InvalidIvLen { expected, actual } =>
                write!(f, "invalid iv length: expected={}, actual={}", expected, actual),
            Misaligned { len, block } =>
                write!(f, "buffer length {} is not a multiple of block size {}", len, block),
            Failure(msg) =>
                write!(f, "crypto failure: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}
