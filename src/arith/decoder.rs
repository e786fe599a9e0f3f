//! Decoder side: FO stream in, bytes out.

use super::{mul_add_div, ArithmeticModel, Interval, IntervalCoder, MAXRANGE_BITS};
use crate::error::Result;
use crate::stream::{ByteQueue, ByteSource, FoStream};

/// Bytes produced per fill, at most.
const FILL_LIMIT: usize = 256;

/// Interval state of the decoder.
///
/// Mirrors [`IntervalEncoder`](super::IntervalEncoder) step for step and
/// additionally tracks the coded value read from the input: the value is
/// `low + (value >> value_shift)`.
pub struct IntervalDecoder<'a> {
    interval: Interval,
    value: u32,
    value_shift: i32,
    input: FoStream<'a>,
}

impl<'a> IntervalDecoder<'a> {
    /// Decode from an FO view of `source`.
    pub fn new<S: ByteSource + 'a>(source: S) -> Self {
        Self {
            interval: Interval::default(),
            value: 0,
            value_shift: -(MAXRANGE_BITS as i32),
            input: FoStream::new(source),
        }
    }

    /// Whether the stream ends before the next symbol.
    ///
    /// Must be called exactly where the encoder called
    /// [`not_end`](super::IntervalEncoder::not_end) or
    /// [`finish`](super::IntervalEncoder::finish). When the stream goes on,
    /// the current free end is reserved just as the encoder did.
    pub fn at_end(&mut self) -> Result<bool> {
        self.refill()?;
        let offset = self
            .interval
            .next_free_end
            .wrapping_sub(self.interval.low)
            .wrapping_shl(self.value_shift as u32);
        if offset == self.value && self.input.in_tail()? {
            return Ok(true);
        }
        self.interval.reserve_free_end();
        Ok(false)
    }

    /// Read input until the value has enough significant bits.
    #[inline]
    fn refill(&mut self) -> Result<()> {
        while self.value_shift <= 0 {
            self.value_shift += 8;
            self.value = (self.value << 8) | self.input.get()? as u32;
        }
        Ok(())
    }

    #[inline]
    fn double_interval(&mut self) {
        self.interval.double();
        self.value_shift -= 1;
    }
}

impl IntervalCoder for IntervalDecoder<'_> {
    #[inline]
    fn target(&self, p1: u32) -> Option<u32> {
        Some(mul_add_div(
            self.value >> self.value_shift,
            p1,
            p1 - 1,
            self.interval.range,
        ))
    }

    fn narrow(&mut self, p1: u32, low: u32, high: u32) -> Result<()> {
        let new_low = self.interval.apply(p1, low, high)?;
        self.value = self
            .value
            .wrapping_sub(new_low.wrapping_shl(self.value_shift as u32));
        if self.interval.needs_scaling() {
            self.double_interval();
            self.interval.fit_free_end()?;
            loop {
                // the dropped byte was already consumed from the input
                let _ = self.interval.take_byte();
                if !self.interval.needs_scaling() {
                    break;
                }
                self.double_interval();
            }
        } else {
            self.interval.fit_free_end()?;
        }
        self.refill()
    }
}

/// Pipeline stage that decompresses an FO stream with a model.
pub struct ArithmeticDecoder<'a, M> {
    coder: IntervalDecoder<'a>,
    model: M,
    done: bool,
}

impl<'a, M: ArithmeticModel> ArithmeticDecoder<'a, M> {
    /// Decode `source` with `model`.
    pub fn new<S: ByteSource + 'a>(model: M, source: S) -> Self {
        Self {
            coder: IntervalDecoder::new(source),
            model,
            done: false,
        }
    }
}

impl<M: ArithmeticModel> ByteSource for ArithmeticDecoder<'_, M> {
    fn fill(&mut self, dest: &mut ByteQueue) -> Result<bool> {
        for _ in 0..FILL_LIMIT {
            if self.done || self.coder.at_end()? {
                self.done = true;
                return Ok(false);
            }
            let symbol = self.model.decode(&mut self.coder)?;
            dest.push(symbol);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::IntervalEncoder;
    use crate::stream::MemorySource;

    #[test]
    fn test_empty_input_is_empty_stream() {
        let mut dec = IntervalDecoder::new(MemorySource::new(&[]));
        assert!(dec.at_end().unwrap());
    }

    #[test]
    fn test_nonempty_input_is_not_at_end() {
        let mut dec = IntervalDecoder::new(MemorySource::new(&[0x40]));
        assert!(!dec.at_end().unwrap());
    }

    #[test]
    fn test_decoder_tracks_encoder_events() {
        // (p1, low, high) events coded blindly, then recovered via target()
        let events: Vec<(u32, u32, u32)> = (0..300u32)
            .map(|i| {
                let p1 = 2 + (i * 37) % 5000;
                let lo = (i * 13) % p1;
                let hi = lo + 1 + (i % (p1 - lo));
                (p1, lo, hi.min(p1))
            })
            .collect();

        let mut enc = IntervalEncoder::new();
        for &(p1, lo, hi) in &events {
            enc.not_end();
            enc.narrow(p1, lo, hi).unwrap();
        }
        enc.finish();
        let mut q = ByteQueue::new();
        while enc.has_output() {
            enc.drain_into(&mut q, 256);
        }
        let coded = q.as_slice().to_vec();

        let mut dec = IntervalDecoder::new(MemorySource::new(&coded));
        for &(p1, lo, hi) in &events {
            assert!(!dec.at_end().unwrap());
            let t = dec.target(p1).unwrap();
            assert!(lo <= t && t < hi, "target {} not in [{}, {})", t, lo, hi);
            dec.narrow(p1, lo, hi).unwrap();
        }
        assert!(dec.at_end().unwrap());
    }
}
