//! Error types for orq

use thiserror::Error;

/// Result type alias using orq's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in orq operations
///
/// The variants form a closed status set: every public entry point either
/// succeeds or returns exactly one of these. Precondition failures
/// (`InvalidHandle`, `InvalidPointer`, `InvalidSize`, `NotImplemented`) are
/// raised before any device-visible work is enqueued, so a rejected call
/// leaves caller data untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unusable execution context
    #[error("Invalid handle: no execution context for this operation")]
    InvalidHandle,

    /// A required buffer reference is absent
    #[error("Invalid pointer: required buffer '{arg}' is null")]
    InvalidPointer {
        /// The argument name
        arg: &'static str,
    },

    /// A dimension, leading-dimension, or batch-count precondition failed
    #[error("Invalid size for '{arg}': {reason}")]
    InvalidSize {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Requested variant is not supported
    #[error("Not implemented: {feature}")]
    NotImplemented {
        /// Description of the unimplemented variant
        feature: &'static str,
    },

    /// Workspace allocation failed
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid-pointer error for a named argument
    pub fn null_pointer(arg: &'static str) -> Self {
        Self::InvalidPointer { arg }
    }

    /// Create an invalid-size error for a named argument
    pub fn invalid_size(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSize {
            arg,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_size("lda", "lda (2) < m (5)");
        assert_eq!(err.to_string(), "Invalid size for 'lda': lda (2) < m (5)");

        let err = Error::null_pointer("tau");
        assert!(err.to_string().contains("'tau'"));
    }
}
