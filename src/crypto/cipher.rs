//! AES-256 cipher stages.

use aes::cipher::{BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes256, Block};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use super::{CryptoError, Passphrase};
use crate::error::Result;
use crate::stream::{ByteQueue, ByteSource, ByteStream, FILL_CHUNK};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

const KEY_SIZE: usize = 32;
const KDF_ITERATIONS: u32 = 4096;
/// There is no header to store a random salt in.
const KDF_SALT: &[u8] = b"bicom bijective stream";

/// Key material derived from a passphrase.
#[derive(Clone)]
pub struct CipherKey {
    key: [u8; KEY_SIZE],
    iv: [u8; BLOCK_SIZE],
}

impl CipherKey {
    /// Derive key and IV with PBKDF2-HMAC-SHA256.
    pub fn derive(passphrase: &Passphrase) -> Self {
        let mut okm = [0u8; KEY_SIZE + BLOCK_SIZE];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), KDF_SALT, KDF_ITERATIONS, &mut okm);
        let mut key = [0u8; KEY_SIZE];
        let mut iv = [0u8; BLOCK_SIZE];
        key.copy_from_slice(&okm[..KEY_SIZE]);
        iv.copy_from_slice(&okm[KEY_SIZE..]);
        Self { key, iv }
    }

    fn block_cipher(&self) -> std::result::Result<Aes256, CryptoError> {
        Aes256::new_from_slice(&self.key).map_err(|_| CryptoError::InvalidKeyLength)
    }
}

/// Keystream block for a trailing partial block.
fn tail_pad(aes: &Aes256, last: &[u8; BLOCK_SIZE]) -> Block {
    let mut pad = Block::clone_from_slice(last);
    aes.encrypt_block(&mut pad);
    pad
}

/// Encrypts its upstream. Output has the same length as the input.
pub struct EncryptSource<'a> {
    input: ByteStream<'a>,
    cbc: Aes256CbcEnc,
    aes: Aes256,
    /// Last ciphertext block written, initially the IV.
    last: [u8; BLOCK_SIZE],
}

impl<'a> EncryptSource<'a> {
    /// Encrypt `source` under `key`.
    pub fn new<S: ByteSource + 'a>(key: &CipherKey, source: S) -> Result<Self> {
        let cbc = Aes256CbcEnc::new_from_slices(&key.key, &key.iv)
            .map_err(|_| CryptoError::InvalidKeyLength)?;
        Ok(Self {
            input: ByteStream::new(source),
            cbc,
            aes: key.block_cipher()?,
            last: key.iv,
        })
    }
}

impl ByteSource for EncryptSource<'_> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        let mut buf = [0u8; BLOCK_SIZE];
        for _ in 0..FILL_CHUNK / BLOCK_SIZE {
            let n = self.input.read(&mut buf)?;
            if n < BLOCK_SIZE {
                if n > 0 {
                    let pad = tail_pad(&self.aes, &self.last);
                    for (b, p) in buf[..n].iter_mut().zip(pad.iter()) {
                        *b ^= p;
                    }
                    dest.extend_from_slice(&buf[..n]);
                }
                return Ok(false);
            }
            let mut block = Block::clone_from_slice(&buf);
            self.cbc.encrypt_block_mut(&mut block);
            self.last.copy_from_slice(&block);
            dest.extend_from_slice(&block);
        }
        Ok(true)
    }
}

/// Inverse of [`EncryptSource`].
pub struct DecryptSource<'a> {
    input: ByteStream<'a>,
    cbc: Aes256CbcDec,
    aes: Aes256,
    /// Last ciphertext block read, initially the IV.
    last: [u8; BLOCK_SIZE],
}

impl<'a> DecryptSource<'a> {
    /// Decrypt `source` under `key`.
    pub fn new<S: ByteSource + 'a>(key: &CipherKey, source: S) -> Result<Self> {
        let cbc = Aes256CbcDec::new_from_slices(&key.key, &key.iv)
            .map_err(|_| CryptoError::InvalidKeyLength)?;
        Ok(Self {
            input: ByteStream::new(source),
            cbc,
            aes: key.block_cipher()?,
            last: key.iv,
        })
    }
}

impl ByteSource for DecryptSource<'_> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        let mut buf = [0u8; BLOCK_SIZE];
        for _ in 0..FILL_CHUNK / BLOCK_SIZE {
            let n = self.input.read(&mut buf)?;
            if n < BLOCK_SIZE {
                if n > 0 {
                    let pad = tail_pad(&self.aes, &self.last);
                    for (b, p) in buf[..n].iter_mut().zip(pad.iter()) {
                        *b ^= p;
                    }
                    dest.extend_from_slice(&buf[..n]);
                }
                return Ok(false);
            }
            self.last = buf;
            let mut block = Block::clone_from_slice(&buf);
            self.cbc.decrypt_block_mut(&mut block);
            dest.extend_from_slice(&block);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{read_all, MemorySource};

    fn key(text: &str) -> CipherKey {
        CipherKey::derive(&Passphrase::parse(text).unwrap())
    }

    fn encrypt(key: &CipherKey, data: &[u8]) -> Vec<u8> {
        read_all(EncryptSource::new(key, MemorySource::new(data)).unwrap()).unwrap()
    }

    fn decrypt(key: &CipherKey, data: &[u8]) -> Vec<u8> {
        read_all(DecryptSource::new(key, MemorySource::new(data)).unwrap()).unwrap()
    }

    #[test]
    fn test_derive_key() {
        let a = key("password");
        let b = key("password");
        assert_eq!(a.key, b.key);
        assert_eq!(a.iv, b.iv);
        assert_ne!(a.key, key("different").key);
    }

    #[test]
    fn test_length_preserving_roundtrip() {
        let k = key("0x0123456789abcdef");
        for len in [0usize, 1, 15, 16, 17, 31, 32, 33, 100, 2048, 2049] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 + 7) as u8).collect();
            let enc = encrypt(&k, &data);
            assert_eq!(enc.len(), len);
            if len > 0 {
                assert_ne!(enc, data);
            }
            assert_eq!(decrypt(&k, &enc), data);
            // decryption is a bijection too
            assert_eq!(encrypt(&k, &decrypt(&k, &data)), data);
        }
    }

    #[test]
    fn test_wrong_key_gives_other_bytes() {
        let data = b"attack at dawn, attack at dawn!!".to_vec();
        let enc = encrypt(&key("right"), &data);
        let dec = decrypt(&key("wrong"), &enc);
        assert_eq!(dec.len(), data.len());
        assert_ne!(dec, data);
    }

    #[test]
    fn test_cbc_chaining() {
        // identical plaintext blocks must not give identical ciphertext blocks
        let k = key("chain");
        let enc = encrypt(&k, &[0xAA; 32]);
        assert_ne!(enc[..16], enc[16..]);
    }
}
