//! Encoder side: bytes in, FO stream out.

use std::collections::VecDeque;

use super::{ArithmeticModel, Interval, IntervalCoder, MAXRANGE_BITS, MAXRANGE_MASK, SHIFT_OUT_BITS};
use crate::error::Result;
use crate::stream::{ByteQueue, ByteSource, ByteStream};

/// Bytes produced per fill, at most.
const FILL_LIMIT: usize = 256;

/// Delays output of `[00-FE] FF*` strings until a carry can no longer
/// reach them.
#[derive(Debug, Default, Clone)]
struct CarryBuffer {
    pending: Option<u8>,
    ff_run: usize,
}

impl CarryBuffer {
    /// Accept one shifted-out value (`0..512`; bit 8 is a carry).
    fn push(&mut self, value: u32, out: &mut VecDeque<(u8, usize)>) {
        let Some(pending) = self.pending else {
            self.pending = Some(value as u8);
            return;
        };
        if value >= 256 {
            // carry: pending+1, then the FF run rolls over to zeros
            push_run(out, pending.wrapping_add(1), 1);
            push_run(out, 0x00, self.ff_run);
        } else if value < 255 {
            push_run(out, pending, 1);
            push_run(out, 0xFF, self.ff_run);
        } else {
            self.ff_run += 1;
            return;
        }
        self.pending = Some(value as u8);
        self.ff_run = 0;
    }

    fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}

fn push_run(out: &mut VecDeque<(u8, usize)>, byte: u8, len: usize) {
    if len > 0 {
        out.push_back((byte, len));
    }
}

/// Interval state of the encoder, plus its pending output.
///
/// Models receive this as an [`IntervalCoder`]. Output accumulates as byte
/// runs and is collected with [`drain_into`](Self::drain_into).
#[derive(Debug, Clone, Default)]
pub struct IntervalEncoder {
    interval: Interval,
    carry: CarryBuffer,
    runs: VecDeque<(u8, usize)>,
}

impl IntervalEncoder {
    /// Create an encoder with a fresh interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower end of the current interval.
    pub fn low(&self) -> u32 {
        self.interval.low
    }

    /// Width of the current interval.
    pub fn range(&self) -> u32 {
        self.interval.range
    }

    /// The reserved free end.
    pub fn free_end(&self) -> u32 {
        self.interval.next_free_end
    }

    /// The stream continues: reserve the current free end before the
    /// next symbol.
    pub fn not_end(&mut self) {
        self.interval.reserve_free_end();
    }

    /// Terminate the stream with the current free end.
    ///
    /// The free end's bits go out MSB first; the zero bytes after it are
    /// implied by the FO tail and never written. The interval is reset
    /// afterwards so the encoder can code another stream.
    pub fn finish(&mut self) {
        let mut end = self
            .interval
            .next_free_end
            .wrapping_shl(SHIFT_OUT_BITS - self.interval.bits);
        while end != 0 {
            self.carry.push(end >> MAXRANGE_BITS, &mut self.runs);
            end = (end & MAXRANGE_MASK) << 8;
        }
        if !self.carry.is_empty() {
            // flush; the byte pushed here is the implicit zero tail
            self.carry.push(0, &mut self.runs);
        }
        self.interval = Interval::default();
        self.carry = CarryBuffer::default();
    }

    /// Whether output is waiting to be drained.
    pub fn has_output(&self) -> bool {
        !self.runs.is_empty()
    }

    /// Move up to `limit` bytes of finished output into `dest`. Returns the
    /// number of bytes moved.
    pub fn drain_into(&mut self, dest: &mut ByteQueue, limit: usize) -> usize {
        let mut moved = 0;
        while moved < limit {
            let Some(run) = self.runs.front_mut() else {
                break;
            };
            let n = run.1.min(limit - moved);
            dest.push_run(run.0, n);
            moved += n;
            run.1 -= n;
            if run.1 == 0 {
                self.runs.pop_front();
            }
        }
        moved
    }
}

impl IntervalCoder for IntervalEncoder {
    #[inline]
    fn target(&self, _p1: u32) -> Option<u32> {
        None
    }

    fn narrow(&mut self, p1: u32, low: u32, high: u32) -> Result<()> {
        let iv = &mut self.interval;
        iv.apply(p1, low, high)?;
        if !iv.needs_scaling() {
            return iv.fit_free_end();
        }
        iv.double();
        iv.fit_free_end()?;
        loop {
            if let Some(byte) = iv.take_byte() {
                self.carry.push(byte, &mut self.runs);
            }
            if !iv.needs_scaling() {
                return Ok(());
            }
            iv.double();
        }
    }
}

/// Pipeline stage that compresses its upstream with a model.
///
/// Output is an FO stream: only the prefix up to the last non-zero byte
/// is produced.
pub struct ArithmeticEncoder<'a, M> {
    input: ByteStream<'a>,
    model: M,
    coder: IntervalEncoder,
    done: bool,
}

impl<'a, M: ArithmeticModel> ArithmeticEncoder<'a, M> {
    /// Encode `source` with `model`.
    pub fn new<S: ByteSource + 'a>(model: M, source: S) -> Self {
        Self {
            input: ByteStream::new(source),
            model,
            coder: IntervalEncoder::new(),
            done: false,
        }
    }
}

impl<M: ArithmeticModel> ByteSource for ArithmeticEncoder<'_, M> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        let mut produced = 0;
        while produced < FILL_LIMIT {
            while !self.coder.has_output() {
                if self.done {
                    return Ok(false);
                }
                match self.input.next_byte()? {
                    Some(symbol) => {
                        self.coder.not_end();
                        self.model.encode(symbol, &mut self.coder)?;
                    }
                    None => {
                        self.coder.finish();
                        self.done = true;
                    }
                }
            }
            produced += self.coder.drain_into(dest, FILL_LIMIT - produced);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs_to_bytes(runs: &VecDeque<(u8, usize)>) -> Vec<u8> {
        runs.iter()
            .flat_map(|&(b, n)| std::iter::repeat(b).take(n))
            .collect()
    }

    #[test]
    fn test_carry_resolve_low() {
        let mut carry = CarryBuffer::default();
        let mut out = VecDeque::new();
        carry.push(0x12, &mut out);
        carry.push(0xFF, &mut out);
        carry.push(0xFF, &mut out);
        assert!(out.is_empty());
        carry.push(0x34, &mut out);
        assert_eq!(runs_to_bytes(&out), vec![0x12, 0xFF, 0xFF]);
        assert_eq!(carry.pending, Some(0x34));
    }

    #[test]
    fn test_carry_resolve_high() {
        let mut carry = CarryBuffer::default();
        let mut out = VecDeque::new();
        carry.push(0x12, &mut out);
        carry.push(0xFF, &mut out);
        carry.push(0xFF, &mut out);
        carry.push(0x100 | 0x07, &mut out);
        assert_eq!(runs_to_bytes(&out), vec![0x13, 0x00, 0x00]);
        assert_eq!(carry.pending, Some(0x07));
    }

    #[test]
    fn test_carry_into_ff_pending() {
        let mut carry = CarryBuffer::default();
        let mut out = VecDeque::new();
        carry.push(0xFF, &mut out);
        carry.push(0x100, &mut out);
        assert_eq!(runs_to_bytes(&out), vec![0x00]);
    }

    #[test]
    fn test_free_end_stays_inside_interval() {
        let mut enc = IntervalEncoder::new();
        // a mix of wide and very narrow events forces many rescales
        let events = [(3u32, 0u32, 1u32), (4096, 4000, 4096), (7, 3, 6), (1 << 20, 5, 6), (2, 1, 2)];
        for round in 0..200 {
            let (p1, lo, hi) = events[round % events.len()];
            enc.not_end();
            enc.narrow(p1, lo, hi).unwrap();
            let offset = enc.free_end().wrapping_sub(enc.low());
            assert!(offset < enc.range(), "round {}", round);
            assert!(enc.range() > crate::arith::MAXRANGE >> 1);
        }
    }

    #[test]
    fn test_empty_stream_encodes_to_nothing() {
        let mut enc = IntervalEncoder::new();
        enc.finish();
        assert!(!enc.has_output());
    }

    #[test]
    fn test_drain_respects_limit() {
        let mut enc = IntervalEncoder::new();
        enc.runs.push_back((0xAB, 300));
        let mut q = ByteQueue::new();
        assert_eq!(enc.drain_into(&mut q, 256), 256);
        assert!(enc.has_output());
        assert_eq!(enc.drain_into(&mut q, 256), 44);
        assert!(!enc.has_output());
        assert_eq!(q.len(), 300);
    }
}
