//! Bijection between byte strings and finitely odd (FO) streams.
//!
//! An FO stream is an infinite byte stream whose last non-zero byte is at a
//! finite position. Written out, only the prefix up to that byte is stored,
//! so an FO stream "is" a byte string that does not end in zero. Mapping
//! every byte string to such a stream (and back) needs one trick: a string
//! that ends on a zero block would lose that block to the implicit tail, so
//! the encoder remembers that a zero was "reserved" and marks the end with a
//! single `0x80` when needed.
//!
//! Both directions work on blocks of `block_len` bytes (usually 1). Only the
//! first byte of a block takes part in the reservation logic; the rest are
//! copied, and any non-zero byte among them cancels the reservation.

use crate::error::Result;
use crate::stream::{ByteQueue, ByteSource, ByteStream, FoStream};

/// Marker that ends an FO stream whose data ended on a reserved zero.
const END_MARKER: u8 = 0x80;

/// Upper bound on bytes produced per fill.
const FILL_LIMIT: usize = 256;

/// Converts a plain byte string into an FO stream.
pub struct FoEncoder<'a> {
    input: ByteStream<'a>,
    block_len: usize,
    reserved_zero: bool,
    done: bool,
}

impl<'a> FoEncoder<'a> {
    /// Encode with one-byte blocks.
    pub fn new<S: ByteSource + 'a>(source: S) -> Self {
        Self::with_block_len(source, 1)
    }

    /// Encode with `block_len`-byte blocks. A zero length is treated as 1.
    pub fn with_block_len<S: ByteSource + 'a>(source: S, block_len: usize) -> Self {
        Self {
            input: ByteStream::new(source),
            block_len: block_len.max(1),
            reserved_zero: false,
            done: false,
        }
    }
}

impl ByteSource for FoEncoder<'_> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        let mut produced = 0;
        while produced < FILL_LIMIT && !self.done {
            produced += self.block_len;
            let Some(first) = self.input.next_byte()? else {
                if self.reserved_zero {
                    dest.push(END_MARKER);
                }
                self.done = true;
                break;
            };
            dest.push(first);
            self.reserved_zero = if self.reserved_zero {
                first & 0x7F == 0
            } else {
                first == 0
            };
            for _ in 1..self.block_len {
                let byte = self.input.next_byte()?.unwrap_or(0);
                dest.push(byte);
                if byte != 0 {
                    self.reserved_zero = false;
                }
            }
        }
        Ok(!self.done)
    }
}

/// Converts an FO stream back into a plain byte string.
pub struct FoDecoder<'a> {
    input: FoStream<'a>,
    block_len: usize,
    reserved_zero: bool,
    done: bool,
}

impl<'a> FoDecoder<'a> {
    /// Decode with one-byte blocks.
    pub fn new<S: ByteSource + 'a>(source: S) -> Self {
        Self::with_block_len(source, 1)
    }

    /// Decode with `block_len`-byte blocks. A zero length is treated as 1.
    pub fn with_block_len<S: ByteSource + 'a>(source: S, block_len: usize) -> Self {
        Self {
            input: FoStream::new(source),
            block_len: block_len.max(1),
            reserved_zero: false,
            done: false,
        }
    }
}

impl ByteSource for FoDecoder<'_> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        let mut produced = 0;
        while produced < FILL_LIMIT && !self.done {
            produced += self.block_len;
            let first = self.input.get()?;
            let sentinel = if self.reserved_zero { END_MARKER } else { 0 };
            if first == sentinel && self.input.in_tail()? {
                self.done = true;
                break;
            }
            dest.push(first);
            self.reserved_zero = if self.reserved_zero {
                first & 0x7F == 0
            } else {
                first == 0
            };
            for _ in 1..self.block_len {
                let byte = self.input.get()?;
                dest.push(byte);
                if byte != 0 {
                    self.reserved_zero = false;
                }
            }
        }
        Ok(!self.done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{read_all, MemorySource};

    fn to_fo(data: &[u8], block_len: usize) -> Vec<u8> {
        read_all(FoEncoder::with_block_len(MemorySource::new(data), block_len)).unwrap()
    }

    fn from_fo(data: &[u8], block_len: usize) -> Vec<u8> {
        read_all(FoDecoder::with_block_len(MemorySource::new(data), block_len)).unwrap()
    }

    #[test]
    fn test_reserved_zero_gets_marker() {
        assert_eq!(to_fo(&[], 1), Vec::<u8>::new());
        assert_eq!(to_fo(&[5], 1), vec![5]);
        assert_eq!(to_fo(&[5, 0], 1), vec![5, 0, END_MARKER]);
        assert_eq!(to_fo(&[0, 0x80], 1), vec![0, 0x80, END_MARKER]);
        assert_eq!(to_fo(&[0, 0x81], 1), vec![0, 0x81]);
    }

    #[test]
    fn test_decoder_inverts_encoder() {
        let cases: [&[u8]; 7] = [
            &[],
            &[0],
            &[0, 0, 0],
            &[0x80],
            &[0, 0x80],
            &[1, 2, 3, 0, 0x80, 0],
            &[0xFF; 600],
        ];
        for case in cases {
            // blocks are only well defined for whole-block inputs
            for block_len in [1, 2, 3].into_iter().filter(|b| case.len() % b == 0) {
                assert_eq!(from_fo(&to_fo(case, block_len), block_len), case);
            }
        }
    }

    #[test]
    fn test_encoder_inverts_decoder() {
        // any byte string read as an FO stream; trailing zeros belong to the tail
        let cases: [&[u8]; 6] = [&[], &[0x80], &[0, 0x80], &[7, 0, 0], &[0, 0, 1], &[0x80, 0x80]];
        for case in cases {
            let mut canonical = case.to_vec();
            while canonical.last() == Some(&0) {
                canonical.pop();
            }
            assert_eq!(to_fo(&from_fo(case, 1), 1), canonical);
        }
    }

    #[test]
    fn test_long_input_spans_fills() {
        let data: Vec<u8> = (0..2000u32).map(|i| if i % 3 == 0 { 0 } else { i as u8 }).collect();
        assert_eq!(from_fo(&to_fo(&data, 1), 1), data);
    }
}
