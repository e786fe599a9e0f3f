//! Leaf and filter sources.

use std::io::{self, Read};

use super::{ByteQueue, ByteSource, FILL_CHUNK};
use crate::error::Result;

/// Byte every output byte is XORed with by [`MaskSource`].
///
/// Without the mask, compressed files would end in the FO sentinel pattern
/// and mostly start with small bytes.
pub const MASK_BYTE: u8 = 0x55;

/// Serves a borrowed slice.
#[derive(Debug, Clone)]
pub struct MemorySource<'a> {
    data: &'a [u8],
}

impl<'a> MemorySource<'a> {
    /// Create a source over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl ByteSource for MemorySource<'_> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        let n = self.data.len().min(FILL_CHUNK);
        let (chunk, rest) = self.data.split_at(n);
        dest.extend_from_slice(chunk);
        self.data = rest;
        Ok(!self.data.is_empty())
    }
}

/// Reads from any [`Read`] implementation, such as an open file.
pub struct ReaderSource<R> {
    reader: R,
    buf: Box<[u8; FILL_CHUNK]>,
}

impl<R: Read> ReaderSource<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Box::new([0u8; FILL_CHUNK]),
        }
    }

    /// Recover the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        let mut filled = 0;
        while filled < FILL_CHUNK {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => {
                    dest.extend_from_slice(&self.buf[..filled]);
                    return Ok(false);
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        dest.extend_from_slice(&self.buf[..filled]);
        Ok(true)
    }
}

/// XORs every byte of its upstream with [`MASK_BYTE`].
pub struct MaskSource<S> {
    inner: S,
}

impl<S: ByteSource> MaskSource<S> {
    /// Mask the output of `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: ByteSource> ByteSource for MaskSource<S> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        let mark = dest.mark();
        let more = self.inner.fill(dest)?;
        for byte in dest.since_mark_mut(mark) {
            *byte ^= MASK_BYTE;
        }
        Ok(more)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::read_all;

    #[test]
    fn test_memory_source_chunks() {
        let data = vec![7u8; FILL_CHUNK + 10];
        let mut src = MemorySource::new(&data);
        let mut q = ByteQueue::new();
        assert!(src.fill(&mut q).unwrap());
        assert_eq!(q.len(), FILL_CHUNK);
        assert!(!src.fill(&mut q).unwrap());
        assert_eq!(q.len(), FILL_CHUNK + 10);
    }

    #[test]
    fn test_reader_source_matches_memory() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 7) as u8).collect();
        let from_reader = read_all(ReaderSource::new(io::Cursor::new(data.clone()))).unwrap();
        assert_eq!(from_reader, data);
    }

    #[test]
    fn test_mask_is_involution() {
        let data = b"bijective".to_vec();
        let once = read_all(MaskSource::new(MemorySource::new(&data))).unwrap();
        assert_eq!(once[0], b'b' ^ MASK_BYTE);
        let twice = read_all(MaskSource::new(MemorySource::new(&once))).unwrap();
        assert_eq!(twice, data);
    }
}
