//! Passphrase encryption of the compressed stream.
//!
//! The cipher is a length-preserving bijection on byte strings, so that
//! encrypting compressed output keeps every byte string decryptable (and
//! decompressible) under every passphrase. No salt, nonce or check value is
//! stored: a wrong passphrase simply yields some other output.
//!
//! - Key schedule: PBKDF2-HMAC-SHA256 with a fixed salt, 48 bytes of output
//!   split into an AES-256 key and a 16-byte IV
//! - Full 16-byte blocks: AES-256-CBC
//! - Trailing partial block: XOR with AES of the last ciphertext block (or
//!   of the IV if there was no full block)
//!
//! The cipher stages need the `crypto` feature; [`Passphrase`] parsing is
//! always available so the CLI can report bad input either way.

#[cfg(feature = "crypto")]
mod cipher;

#[cfg(feature = "crypto")]
pub use cipher::{CipherKey, DecryptSource, EncryptSource, BLOCK_SIZE};

use crate::error::{BicomError, Result};

/// Error type for cipher setup.
#[derive(Debug, Clone)]
pub enum CryptoError {
    /// Key or IV had the wrong length for the cipher.
    InvalidKeyLength,
    /// A passphrase was given but the crate was built without the `crypto`
    /// feature.
    Unsupported,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptoError::InvalidKeyLength => write!(f, "Invalid key length"),
            CryptoError::Unsupported => write!(f, "Encryption support not compiled in"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Raw passphrase bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(Vec<u8>);

impl Passphrase {
    /// Parse a command-line passphrase.
    ///
    /// Text starting with `0x` or `0X` is hex: whitespace and control
    /// characters are skipped and an odd final nibble is padded with a zero
    /// nibble. Anything else is taken as its UTF-8 bytes.
    pub fn parse(text: &str) -> Result<Self> {
        let bytes = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(digits) => {
                let mut digits: String = digits.chars().filter(|&c| c > ' ').collect();
                if digits.len() % 2 == 1 {
                    digits.push('0');
                }
                hex::decode(&digits).map_err(|e| {
                    BicomError::InvalidPassphrase(format!("bad hex passphrase: {}", e))
                })?
            }
            None => text.as_bytes().to_vec(),
        };
        Self::from_bytes(bytes)
    }

    /// Use `bytes` as the passphrase.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(BicomError::InvalidPassphrase("passphrase is empty".into()));
        }
        Ok(Self(bytes))
    }

    /// The passphrase bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Passphrase({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_passphrase() {
        let p = Passphrase::parse("open sesame").unwrap();
        assert_eq!(p.as_bytes(), b"open sesame");
    }

    #[test]
    fn test_hex_passphrase() {
        assert_eq!(Passphrase::parse("0xDEad bE ef").unwrap().as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(Passphrase::parse("0X123").unwrap().as_bytes(), &[0x12, 0x30]);
    }

    #[test]
    fn test_invalid_passphrases() {
        assert!(matches!(Passphrase::parse("0xzz"), Err(BicomError::InvalidPassphrase(_))));
        assert!(matches!(Passphrase::parse(""), Err(BicomError::InvalidPassphrase(_))));
        assert!(matches!(Passphrase::parse("0x  "), Err(BicomError::InvalidPassphrase(_))));
    }

    #[test]
    fn test_debug_hides_bytes() {
        let p = Passphrase::parse("secret").unwrap();
        assert_eq!(format!("{:?}", p), "Passphrase(6 bytes)");
    }
}
