use std::collections::TryReserveError;
use std::fmt;

use crate::accelerator::AcceleratorError;
use crate::crypto::CryptoError;

/// Unified error for the chained-cipher context.
/// - Ergonomic `From<T>` impls enable `?` across init / ctrl / process.
/// - Verification failures collapse into `BadRecordMac` with no cause detail.
#[derive(Debug)]
pub enum ChainError {
    /// Malformed sizes, out-of-range lane counts, version/lane conflicts.
    InvalidArgument(String),

    /// Operation invoked out of the required init sequence.
    InvalidState(String),

    /// Allocation of key, session or scratch memory failed.
    ResourceExhausted(String),

    /// Session or submission failure reported by the accelerator.
    Accelerator(AcceleratorError),

    /// Record failed authentication (digest or padding, indistinguishably).
    BadRecordMac,
}

impl ChainError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ChainError::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ChainError::InvalidState(msg.into())
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            ChainError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            ChainError::ResourceExhausted(msg) => write!(f, "resource exhausted: {}", msg),
            ChainError::Accelerator(e) => write!(f, "accelerator error: {}", e),
            ChainError::BadRecordMac => write!(f, "record authentication failed"),
        }
    }
}

impl std::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChainError::Accelerator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AcceleratorError> for ChainError {
    fn from(e: AcceleratorError) -> Self {
        ChainError::Accelerator(e)
    }
}

impl From<CryptoError> for ChainError {
    fn from(e: CryptoError) -> Self {
        ChainError::InvalidArgument(e.to_string())
    }
}

impl From<TryReserveError> for ChainError {
    fn from(e: TryReserveError) -> Self {
        ChainError::ResourceExhausted(e.to_string())
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
