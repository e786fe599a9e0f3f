//! Compression driver.
//!
//! Chains the pipeline stages into the two directions of the codec:
//!
//! ```text
//! compress:   input → arithmetic encode (PPM*) → FO to bytes → mask → [encrypt]
//! decompress: input → [decrypt] → mask → bytes to FO → arithmetic decode (PPM*)
//! ```
//!
//! Every stage is a bijection, so `decompress(compress(x)) == x` and
//! `compress(decompress(y)) == y` for all byte strings `x` and `y`.
//!
//! ## Example
//!
//! ```rust
//! use bicom::{compress, decompress};
//!
//! let packed = compress(b"abracadabra abracadabra").unwrap();
//! assert_eq!(decompress(&packed).unwrap(), b"abracadabra abracadabra");
//!
//! // any byte string is a valid compressed stream
//! let text = decompress(b"not really compressed").unwrap();
//! assert_eq!(compress(&text).unwrap(), b"not really compressed");
//! ```

use std::io::{Read, Write};

use log::debug;

use crate::arith::{ArithmeticDecoder, ArithmeticEncoder, ArithmeticModel};
use crate::crypto::Passphrase;
use crate::error::Result;
use crate::fo::{FoDecoder, FoEncoder};
use crate::model::SuffixTreeModel;
use crate::stream::{read_all, ByteSource, ByteStream, MaskSource, MemorySource, ReaderSource};

#[cfg(feature = "crypto")]
use crate::crypto::{CipherKey, DecryptSource, EncryptSource};

/// Window size of the suffix-tree model used by [`compress`] and
/// [`decompress`].
pub const DEFAULT_WINDOW: usize = 1 << 20;

/// Window size used by [`self_test`].
pub const SELF_TEST_WINDOW: usize = 4096;

#[cfg(feature = "crypto")]
type Key = CipherKey;
#[cfg(not(feature = "crypto"))]
type Key = std::convert::Infallible;

/// Options for a [`Codec`].
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Sliding window of the context model in bytes. Compressor and
    /// decompressor must agree on it.
    pub window_size: usize,
    /// Encrypt the compressed stream under this passphrase.
    pub passphrase: Option<Passphrase>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW,
            passphrase: None,
        }
    }
}

/// A configured compressor/decompressor.
pub struct Codec {
    options: CodecOptions,
    key: Option<Key>,
}

impl Codec {
    /// Create a codec. Derives the cipher key if a passphrase is set.
    pub fn new(options: CodecOptions) -> Result<Self> {
        let key = match &options.passphrase {
            #[cfg(feature = "crypto")]
            Some(passphrase) => Some(CipherKey::derive(passphrase)),
            #[cfg(not(feature = "crypto"))]
            Some(_) => return Err(crate::crypto::CryptoError::Unsupported.into()),
            None => None,
        };
        Ok(Self { options, key })
    }

    fn model(&self) -> SuffixTreeModel {
        SuffixTreeModel::new(self.options.window_size)
    }

    /// Compress a byte string.
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        debug!("compressing {} bytes, window {}", input.len(), self.options.window_size);
        let output = read_all(compressor(
            self.model(),
            MemorySource::new(input),
            self.key.as_ref(),
        )?)?;
        debug!("compressed {} bytes to {}", input.len(), output.len());
        Ok(output)
    }

    /// Decompress a byte string. Never fails on account of the input.
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        debug!("decompressing {} bytes, window {}", input.len(), self.options.window_size);
        let output = read_all(decompressor(
            self.model(),
            MemorySource::new(input),
            self.key.as_ref(),
        )?)?;
        debug!("decompressed {} bytes to {}", input.len(), output.len());
        Ok(output)
    }

    /// Compress everything `reader` yields into `writer`. Returns the
    /// number of bytes written.
    pub fn compress_stream<R: Read, W: Write>(&self, reader: R, writer: &mut W) -> Result<u64> {
        debug!("compressing stream, window {}", self.options.window_size);
        let written = pump(
            compressor(self.model(), ReaderSource::new(reader), self.key.as_ref())?,
            writer,
        )?;
        debug!("compressed stream to {} bytes", written);
        Ok(written)
    }

    /// Decompress everything `reader` yields into `writer`. Returns the
    /// number of bytes written.
    pub fn decompress_stream<R: Read, W: Write>(&self, reader: R, writer: &mut W) -> Result<u64> {
        debug!("decompressing stream, window {}", self.options.window_size);
        let written = pump(
            decompressor(self.model(), ReaderSource::new(reader), self.key.as_ref())?,
            writer,
        )?;
        debug!("decompressed stream to {} bytes", written);
        Ok(written)
    }
}

/// Compress `input` with the default options.
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    Codec::new(CodecOptions::default())?.compress(input)
}

/// Decompress `input` with the default options.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    Codec::new(CodecOptions::default())?.decompress(input)
}

fn compressor<'a, M, S>(model: M, source: S, key: Option<&Key>) -> Result<Box<dyn ByteSource + 'a>>
where
    M: ArithmeticModel + 'a,
    S: ByteSource + 'a,
{
    let masked = MaskSource::new(FoDecoder::new(ArithmeticEncoder::new(model, source)));
    match key {
        #[cfg(feature = "crypto")]
        Some(key) => Ok(Box::new(EncryptSource::new(key, masked)?)),
        #[cfg(not(feature = "crypto"))]
        Some(never) => match *never {},
        None => Ok(Box::new(masked)),
    }
}

fn decompressor<'a, M, S>(model: M, source: S, key: Option<&Key>) -> Result<Box<dyn ByteSource + 'a>>
where
    M: ArithmeticModel + 'a,
    S: ByteSource + 'a,
{
    let plain: Box<dyn ByteSource + 'a> = match key {
        #[cfg(feature = "crypto")]
        Some(key) => Box::new(DecryptSource::new(key, source)?),
        #[cfg(not(feature = "crypto"))]
        Some(never) => match *never {},
        None => Box::new(source),
    };
    let fo = FoEncoder::new(MaskSource::new(plain));
    Ok(Box::new(ArithmeticDecoder::new(model, fo)))
}

fn pump<S: ByteSource, W: Write>(source: S, writer: &mut W) -> Result<u64> {
    let mut stream = ByteStream::new(source);
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok(total)
}

/// Which round trip of the self test failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `decompress(compress(x)) != x`
    CompressFirst,
    /// `compress(decompress(x)) != x`
    DecompressFirst,
}

/// An input the codec failed to round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestFailure {
    /// The offending input.
    pub input: Vec<u8>,
    /// The round trip that failed.
    pub direction: Direction,
}

/// Exhaustive bijectivity check over short inputs.
///
/// Uses a [`SELF_TEST_WINDOW`] byte window and reuses its two models
/// across cases, resetting them before each round trip.
pub struct SelfTest {
    codec: Codec,
    model_in: SuffixTreeModel,
    model_out: SuffixTreeModel,
}

impl SelfTest {
    /// Prepare a self test, encrypting with `passphrase` if given.
    pub fn new(passphrase: Option<Passphrase>) -> Result<Self> {
        let codec = Codec::new(CodecOptions {
            window_size: SELF_TEST_WINDOW,
            passphrase,
        })?;
        Ok(Self {
            model_in: codec.model(),
            model_out: codec.model(),
            codec,
        })
    }

    /// Round-trip `input` in both directions.
    pub fn check(&mut self, input: &[u8]) -> Result<Option<Direction>> {
        let key = self.codec.key.as_ref();

        self.model_in.reset();
        self.model_out.reset();
        let packed = compressor(&mut self.model_in, MemorySource::new(input), key)?;
        if !yields(decompressor(&mut self.model_out, packed, key)?, input)? {
            return Ok(Some(Direction::CompressFirst));
        }

        self.model_in.reset();
        self.model_out.reset();
        let unpacked = decompressor(&mut self.model_in, MemorySource::new(input), key)?;
        if !yields(compressor(&mut self.model_out, unpacked, key)?, input)? {
            return Ok(Some(Direction::DecompressFirst));
        }
        Ok(None)
    }

    /// Check every input of exactly `len` bytes.
    pub fn run_length(&mut self, len: usize) -> Result<Option<SelfTestFailure>> {
        let mut input = vec![0u8; len];
        loop {
            if let Some(direction) = self.check(&input)? {
                return Ok(Some(SelfTestFailure { input, direction }));
            }
            // little-endian increment; done when it wraps back to all zeros
            let mut i = 0;
            loop {
                if i == len {
                    return Ok(None);
                }
                input[i] = input[i].wrapping_add(1);
                if input[i] != 0 {
                    break;
                }
                i += 1;
            }
        }
    }
}

/// Check bijectivity on every input of up to `max_len` bytes. Returns the
/// first failure, if any.
pub fn self_test(max_len: usize, passphrase: Option<Passphrase>) -> Result<Option<SelfTestFailure>> {
    let mut test = SelfTest::new(passphrase)?;
    for len in 0..=max_len {
        debug!("self test: {} byte inputs", len);
        if let Some(failure) = test.run_length(len)? {
            return Ok(Some(failure));
        }
    }
    Ok(None)
}

/// Whether `source` produces exactly `expected`.
fn yields<S: ByteSource>(source: S, expected: &[u8]) -> Result<bool> {
    let mut stream = ByteStream::new(source);
    for &byte in expected {
        if stream.next_byte()? != Some(byte) {
            return Ok(false);
        }
    }
    stream.at_end()
}
