//! Error types for bijective compression and decompression.
//!
//! This module provides the [`BicomError`] type which covers every way a
//! compression or decompression run can fail.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Setup | [`Io`], [`InvalidPassphrase`], [`Crypto`] | Bad files or keys, reported before any output |
//! | Coder | [`CoderInvariant`] | The arithmetic coder's interval or free end went out of bounds |
//! | Model | [`TreeCorrupted`], [`ModelMismatch`] | The context model lost its structural invariants |
//!
//! There is deliberately no "corrupt input" error: every byte string is a
//! valid compressed stream. Coder and model errors always mean an
//! implementation bug, and the run that produced them must be discarded.
//!
//! ## Example
//!
//! ```rust
//! use bicom::{decompress, BicomError};
//!
//! match decompress(b"any bytes at all") {
//!     Ok(bytes) => println!("{} bytes", bytes.len()),
//!     Err(BicomError::Io(e)) => eprintln!("I/O: {}", e),
//!     Err(e) => eprintln!("internal error: {}", e),
//! }
//! ```
//!
//! [`Io`]: BicomError::Io
//! [`InvalidPassphrase`]: BicomError::InvalidPassphrase
//! [`Crypto`]: BicomError::Crypto
//! [`CoderInvariant`]: BicomError::CoderInvariant
//! [`TreeCorrupted`]: BicomError::TreeCorrupted
//! [`ModelMismatch`]: BicomError::ModelMismatch

use std::fmt;
use std::io;

/// Error type for bicom operations.
#[derive(Debug)]
pub enum BicomError {
    /// An I/O error occurred while reading input or writing output.
    Io(io::Error),

    /// The passphrase could not be used.
    ///
    /// Hex passphrases (`0x...`) may only contain hex digits and whitespace,
    /// and a passphrase must contain at least one byte.
    InvalidPassphrase(String),

    /// The arithmetic coder was asked to leave its valid state.
    ///
    /// Raised when a symbol interval is empty or lies outside `[0, p1]`, or
    /// when the reserved free end falls outside `[low, low + range)`.
    CoderInvariant {
        /// What went wrong.
        what: &'static str,
        /// Interval low end at the time of the failure.
        low: u32,
        /// Interval width at the time of the failure.
        range: u32,
    },

    /// The suffix tree violated one of its structural invariants.
    TreeCorrupted(&'static str),

    /// The decoder could not map a coded position back to a symbol.
    ModelMismatch,

    /// Cipher setup failed.
    Crypto(crate::crypto::CryptoError),
}

impl fmt::Display for BicomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::InvalidPassphrase(msg) => write!(f, "Invalid passphrase: {}", msg),
            Self::CoderInvariant { what, low, range } => {
                write!(
                    f,
                    "Arithmetic coder invariant violated: {} (low=0x{:08x}, range=0x{:08x})",
                    what, low, range
                )
            }
            Self::TreeCorrupted(what) => write!(f, "Suffix tree corrupted: {}", what),
            Self::ModelMismatch => write!(f, "Decoded position matches no symbol"),
            Self::Crypto(e) => write!(f, "Cipher error: {}", e),
        }
    }
}

impl std::error::Error for BicomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BicomError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<crate::crypto::CryptoError> for BicomError {
    fn from(e: crate::crypto::CryptoError) -> Self {
        Self::Crypto(e)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BicomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_coder_invariant() {
        let err = BicomError::CoderInvariant {
            what: "free end outside interval",
            low: 0x10,
            range: 0x400000,
        };
        let text = err.to_string();
        assert!(text.contains("free end outside interval"));
        assert!(text.contains("0x00400000"));
    }

    #[test]
    fn test_io_source() {
        use std::error::Error;
        let err = BicomError::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert!(err.source().is_some());
        assert!(BicomError::ModelMismatch.source().is_none());
    }
}
