//! Error Types
//!
//! This module defines the error type shared by the allocation planner, the
//! streamer and the data uploader.
//!
//! # Overview
//!
//! [`MemoryError`] follows the result-code taxonomy every backend reports:
//! - malformed requests ([`MemoryError::InvalidArgument`])
//! - exhausted staging/ring capacity or failed native allocations
//!   ([`MemoryError::OutOfMemory`])
//! - missing backend capabilities or memory classes ([`MemoryError::Unsupported`])
//! - everything else, e.g. a map that returned nothing ([`MemoryError::Failure`])
//!
//! Success is plain `Ok(..)`.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, MemoryError>`.
//!
//! ```rust,ignore
//! use myth_memory::errors::{MemoryError, Result};
//!
//! fn reserve(size: u64) -> Result<u64> {
//!     if size == 0 {
//!         return Err(MemoryError::InvalidArgument("zero-sized request".into()));
//!     }
//!     Ok(size)
//! }
//! ```

use thiserror::Error;

/// The error type for every memory and streaming operation.
///
/// Components fail fast: the first error is propagated to the caller without
/// retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The request itself is malformed (zero-sized item, short source data,
    /// wrong memory location for the operation, unknown handle).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An item does not fit into the achievable staging/ring capacity, or the
    /// backend could not satisfy a native allocation.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// The backend lacks the requested capability or memory class.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Generic backend failure.
    #[error("Failure: {0}")]
    Failure(String),
}

impl MemoryError {
    /// Returns `true` for [`MemoryError::OutOfMemory`].
    #[inline]
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory(_))
    }
}

/// Alias for `Result<T, MemoryError>`.
pub type Result<T> = std::result::Result<T, MemoryError>;
