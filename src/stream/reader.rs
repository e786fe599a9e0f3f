//! Consumer-side views of an upstream [`ByteSource`].

use super::{ByteQueue, ByteSource};
use crate::error::Result;

/// Reads an upstream source as a finite byte string.
///
/// The upstream is dropped as soon as it reports exhaustion, which tears
/// down the rest of the chain behind it.
pub struct ByteStream<'a> {
    queue: ByteQueue,
    source: Option<Box<dyn ByteSource + 'a>>,
}

impl<'a> ByteStream<'a> {
    /// Create a stream over `source`.
    pub fn new<S: ByteSource + 'a>(source: S) -> Self {
        Self {
            queue: ByteQueue::new(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether every byte has been consumed. Pulls upstream as needed.
    pub fn at_end(&mut self) -> Result<bool> {
        while self.queue.is_empty() {
            let Some(source) = self.source.as_mut() else {
                return Ok(true);
            };
            if !source.fill(&mut self.queue)? {
                self.source = None;
            }
        }
        Ok(false)
    }

    /// Next byte, or `None` at the end of the stream.
    #[inline]
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.at_end()? {
            return Ok(None);
        }
        Ok(self.queue.pop())
    }

    /// Read up to `dest.len()` bytes, stopping early only at the end of the
    /// stream. Returns the number of bytes read.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<usize> {
        let mut done = 0;
        while done < dest.len() && !self.at_end()? {
            done += self.queue.read_into(&mut dest[done..]);
        }
        Ok(done)
    }
}

/// Reads an upstream source as a finitely odd (FO) stream.
///
/// An FO stream is infinite: after the last non-zero byte of the upstream
/// data come infinitely many zeros. Zero runs are therefore held back
/// (counted, not buffered) until a later non-zero byte proves they are not
/// part of the tail, which lets [`in_tail`](Self::in_tail) answer "is all
/// remaining input zero?" without reading to the end.
pub struct FoStream<'a> {
    queue: ByteQueue,
    source: Option<Box<dyn ByteSource + 'a>>,
    /// Zeros that precede the buffered data.
    pre_zeros: u64,
    /// Zeros that trailed the last fill; they become `pre_zeros` if more
    /// data arrives.
    post_zeros: u64,
}

impl<'a> FoStream<'a> {
    /// Create an FO view over `source`.
    pub fn new<S: ByteSource + 'a>(source: S) -> Self {
        Self {
            queue: ByteQueue::new(),
            source: Some(Box::new(source)),
            pre_zeros: 0,
            post_zeros: 0,
        }
    }

    /// Whether every remaining byte of the stream is zero.
    #[inline]
    pub fn in_tail(&mut self) -> Result<bool> {
        if self.queue.is_empty() {
            self.fill()
        } else {
            Ok(false)
        }
    }

    /// Next byte of the infinite stream.
    #[inline]
    pub fn get(&mut self) -> Result<u8> {
        if self.in_tail()? {
            Ok(0)
        } else if self.pre_zeros > 0 {
            self.pre_zeros -= 1;
            Ok(0)
        } else {
            Ok(self.queue.pop().unwrap_or(0))
        }
    }

    /// Refill the queue until it holds a non-zero byte or the upstream ends.
    /// Returns `in_tail()`.
    fn fill(&mut self) -> Result<bool> {
        while self.queue.is_empty() {
            self.pre_zeros += self.post_zeros;
            self.post_zeros = 0;
            let Some(source) = self.source.as_mut() else {
                return Ok(true);
            };
            let mark = self.queue.mark();
            if !source.fill(&mut self.queue)? {
                self.source = None;
            }
            let fresh = self.queue.since_mark_mut(mark);
            let lead = fresh.iter().take_while(|&&b| b == 0).count();
            let trail = fresh[lead..].iter().rev().take_while(|&&b| b == 0).count();
            self.queue.unput(trail);
            self.queue.skip(lead);
            self.pre_zeros += lead as u64;
            self.post_zeros += trail as u64;
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemorySource;

    #[test]
    fn test_byte_stream_reads_everything() {
        let data: Vec<u8> = (0..3000u32).map(|i| i as u8).collect();
        let mut stream = ByteStream::new(MemorySource::new(&data));
        let mut out = vec![0u8; 4000];
        let n = stream.read(&mut out).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(&out[..n], data.as_slice());
        assert!(stream.at_end().unwrap());
    }

    #[test]
    fn test_fo_stream_tail_detection() {
        let data = [0u8, 0, 7, 0, 0, 3, 0, 0];
        let mut fo = FoStream::new(MemorySource::new(&data));
        assert!(!fo.in_tail().unwrap());
        assert_eq!(fo.get().unwrap(), 0);
        assert_eq!(fo.get().unwrap(), 0);
        assert_eq!(fo.get().unwrap(), 7);
        assert_eq!(fo.get().unwrap(), 0);
        assert_eq!(fo.get().unwrap(), 0);
        assert!(!fo.in_tail().unwrap());
        assert_eq!(fo.get().unwrap(), 3);
        // trailing zeros of the input are indistinguishable from the tail
        assert!(fo.in_tail().unwrap());
        assert_eq!(fo.get().unwrap(), 0);
        assert_eq!(fo.get().unwrap(), 0);
    }

    #[test]
    fn test_fo_stream_zeros_across_fills() {
        // zeros that straddle the 1024-byte fill boundary must be replayed
        let mut data = vec![0u8; 2100];
        data[0] = 1;
        data[2099] = 2;
        let mut fo = FoStream::new(MemorySource::new(&data));
        let mut out = Vec::new();
        while !fo.in_tail().unwrap() {
            out.push(fo.get().unwrap());
        }
        assert_eq!(out, data);
    }

    #[test]
    fn test_fo_stream_empty_source() {
        let mut fo = FoStream::new(MemorySource::new(&[]));
        assert!(fo.in_tail().unwrap());
        assert_eq!(fo.get().unwrap(), 0);
    }
}
