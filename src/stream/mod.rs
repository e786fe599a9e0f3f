//! Pull-based byte pipeline.
//!
//! Every processing stage (file reader, XOR mask, FO conversion, cipher,
//! arithmetic coder) implements [`ByteSource`]: when asked, it appends some
//! bytes to a [`ByteQueue`] and reports whether more may follow. A stage owns
//! (or mutably borrows) exactly one upstream stage and pulls it only when its
//! own buffered input runs dry, so an arbitrary linear chain such as
//!
//! ```text
//! file → decrypt → mask → bytes-to-FO → arithmetic decode → output
//! ```
//!
//! runs lazily without materialising any intermediate stream.
//!
//! Consumers read through one of two helpers:
//!
//! | Reader | Sees the upstream as |
//! |--------|----------------------|
//! | [`ByteStream`] | a finite byte string |
//! | [`FoStream`] | a "finitely odd" stream: trailing zeros are an infinite tail |

mod queue;
mod reader;
mod sources;

pub use queue::ByteQueue;
pub use reader::{ByteStream, FoStream};
pub use sources::{MaskSource, MemorySource, ReaderSource, MASK_BYTE};

use crate::error::Result;

/// Maximum number of bytes a leaf source hands out per fill.
pub const FILL_CHUNK: usize = 1024;

/// A producer of bytes in a pull pipeline.
pub trait ByteSource {
    /// Append more bytes to `dest`.
    ///
    /// Returns `Ok(false)` once the source is exhausted. Bytes appended by
    /// that final call are still valid output. A source may append nothing
    /// and still return `Ok(true)`.
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        (**self).fill(dest)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        (**self).fill(dest)
    }
}

/// Drain a source completely into a vector.
pub fn read_all<S: ByteSource>(source: S) -> Result<Vec<u8>> {
    let mut stream = ByteStream::new(source);
    let mut out = Vec::new();
    while let Some(byte) = stream.next_byte()? {
        out.push(byte);
    }
    Ok(out)
}
