//! Error types for the **imgchain** core crate.
//!
//! All fallible operations return [`crate::Result`], a convenient alias for
//! `core::result::Result<T, Error>`. The enum is intentionally flat: decode
//! and validation failures are mapped into one of these variants before
//! bubbling up to callers.
//!
//! # Examples
//!
//! ```
//! use imgchain_core::error::{Error, Result};
//!
//! fn demo_fn(fail: bool) -> Result<()> {
//!     if fail {
//!         Err(Error::EmptyChain)
//!     } else {
//!         Ok(())
//!     }
//! }
//! ```

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// A hex identifier did not have the expected ASCII length.
    #[error("expected {expected} hex characters, got {got}")]
    InvalidHexLength { expected: usize, got: usize },

    /// A hex identifier contained a non-hex-digit byte.
    #[error("invalid hex digit {0:?}")]
    InvalidHexChar(char),

    /// A wire buffer was shorter than the structure being decoded from it.
    #[error("buffer too short: need {need} bytes, have {have}")]
    BufferTooShort { need: usize, have: usize },

    /// Attempted to encode a block whose `hash` has not been sealed yet.
    #[error("attempted to encode an unsealed block")]
    UnsealedBlock,

    /// A chain (or chain dump) has no blocks to operate on.
    #[error("chain is empty")]
    EmptyChain,

    /// Placeholder for errors originating from elsewhere with only a message.
    #[error("{0}")]
    Other(&'static str),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
