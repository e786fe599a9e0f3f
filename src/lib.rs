//! Bijective PPM* compression.
//!
//! `bicom` compresses with an unbounded-order context model (PPM*) over a
//! sliding-window suffix tree, driving a bijective arithmetic coder.
//! Compression and decompression are exact inverses over *all* byte
//! strings: every byte string is a valid compressed stream, and
//! re-compressing the output of `decompress` gives back the input.
//!
//! There is no header, magic number or length field in the compressed
//! format, and no "corrupt input" error.
//!
//! ## Features
//! - `crypto` (default) - passphrase encryption of the compressed stream
//!   with AES-256, keeping the whole pipeline bijective
//!
//! ## Example
//!
//! ```rust
//! use bicom::{Codec, CodecOptions};
//!
//! let codec = Codec::new(CodecOptions {
//!     window_size: 1 << 16,
//!     ..Default::default()
//! })?;
//! let packed = codec.compress(b"to be or not to be")?;
//! assert_eq!(codec.decompress(&packed)?, b"to be or not to be");
//! # Ok::<(), bicom::BicomError>(())
//! ```

pub mod arith;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod fo;
pub mod model;
pub mod stream;

pub use codec::{
    compress, decompress, self_test, Codec, CodecOptions, Direction, SelfTest, SelfTestFailure,
    DEFAULT_WINDOW, SELF_TEST_WINDOW,
};
pub use crypto::{CryptoError, Passphrase};
pub use error::{BicomError, Result};
pub use model::SuffixTreeModel;
pub use stream::{ByteQueue, ByteSource};
