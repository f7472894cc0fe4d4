//! Error types for Annex.
//!
//! This module provides a unified error type for all Annex operations.
//! Every variant carries a short diagnostic string suitable for handing
//! back to the host engine unchanged.
//!
//! Allocation failure has no variant on purpose: infallible allocation
//! aborts the process in Rust, so the "out of memory" outcome the host
//! observes is process policy rather than an `Error` value.

use thiserror::Error;

/// Result type alias for Annex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Annex operations.
///
/// Error codes follow the pattern `ANNEX-XXX` for easy debugging.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed caller input (ANNEX-001): wrong value kind, a vector
    /// literal missing its brackets, an unparsable number, or operands
    /// of different lengths.
    #[error("[ANNEX-001] {0}")]
    InvalidArgument(String),

    /// A documented limit was exceeded (ANNEX-002): vector dimension
    /// above 16000 or a float token longer than 1024 characters.
    #[error("[ANNEX-002] {0}")]
    LimitExceeded(String),

    /// Dimension mismatch between a vector and the index (ANNEX-003).
    #[error("[ANNEX-003] vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension declared by the index header or schema.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// IO error (ANNEX-004). Short reads and writes surface here as
    /// `UnexpectedEof` / `WriteZero` rather than being silently truncated.
    #[error("[ANNEX-004] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index corrupted (ANNEX-005): bad magic, an offset outside the
    /// file, or a block whose contents contradict the header.
    ///
    /// A corrupt index is never repaired automatically; it must be
    /// rebuilt from the base table.
    #[error("[ANNEX-005] index corrupted: {0}")]
    CorruptIndex(String),

    /// Unsupported on-disk feature (ANNEX-006): a vector-type or
    /// similarity tag this build does not understand.
    #[error("[ANNEX-006] unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns the error code (e.g., "ANNEX-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "ANNEX-001",
            Self::LimitExceeded(_) => "ANNEX-002",
            Self::DimensionMismatch { .. } => "ANNEX-003",
            Self::Io(_) => "ANNEX-004",
            Self::CorruptIndex(_) => "ANNEX-005",
            Self::Unsupported(_) => "ANNEX-006",
        }
    }

    /// Returns true if the operation can be retried with fixed input.
    ///
    /// Corruption and unsupported-feature errors are not recoverable:
    /// the file itself has to change, not the call.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::CorruptIndex(_) | Self::Unsupported(_))
    }
}
