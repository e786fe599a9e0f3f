//! Bijective arithmetic coding.
//!
//! The coder keeps a `(low, range)` interval of [`MAXRANGE_BITS`] significant
//! bits and narrows it for each coded event. What makes it bijective is the
//! *free end*: before every symbol the encoder reserves one value inside the
//! current interval as "the stream could have ended here". Since that value
//! is never used for a symbol, the decoder can tell where the data ends by
//! checking whether the remaining input equals the reserved value followed
//! by zeros, so no length field or end symbol is needed.
//!
//! Free ends are chosen as "even" as possible (most trailing zero bits), so
//! that terminating the stream costs as few bytes as possible.
//!
//! ## Components
//!
//! | Type | Role |
//! |------|------|
//! | [`IntervalEncoder`] | interval state, free end and carry propagation |
//! | [`IntervalDecoder`] | mirror state reading an FO stream |
//! | [`ArithmeticEncoder`] | pipeline stage: bytes → FO stream |
//! | [`ArithmeticDecoder`] | pipeline stage: FO stream → bytes |
//!
//! Models talk to either side through [`IntervalCoder`], so one model walk
//! serves both directions.

mod decoder;
mod encoder;

pub use decoder::{ArithmeticDecoder, IntervalDecoder};
pub use encoder::{ArithmeticEncoder, IntervalEncoder};

use crate::error::{BicomError, Result};

/// Significant bits in the coding interval.
pub const MAXRANGE_BITS: u32 = 23;
/// Width of a fresh coding interval.
pub const MAXRANGE: u32 = 1 << MAXRANGE_BITS;
/// Mask of the bits below [`MAXRANGE`].
pub const MAXRANGE_MASK: u32 = MAXRANGE - 1;
/// Exclusive upper bound on the probability total of a single event.
pub const MAXP1: u32 = 1 << 21;

/// Interval bit count at which one byte is shifted out.
const SHIFT_OUT_BITS: u32 = MAXRANGE_BITS + 8;

/// `(a * b + acc) / div` without intermediate overflow.
#[inline]
pub fn mul_add_div(a: u32, b: u32, acc: u32, div: u32) -> u32 {
    ((a as u64 * b as u64 + acc as u64) / div as u64) as u32
}

/// The side of the coder a model drives.
///
/// An event is a sub-interval `[low, high)` of `[0, p1)`. The encoder is told
/// which event happened; the decoder first reports where the coded value
/// lies and the model turns that into an event.
pub trait IntervalCoder {
    /// Position of the coded value within `[0, p1)`, or `None` when encoding.
    fn target(&self, p1: u32) -> Option<u32>;

    /// Narrow the interval to the event `[low, high)` out of `p1`.
    fn narrow(&mut self, p1: u32, low: u32, high: u32) -> Result<()>;
}

/// A probability model over bytes.
pub trait ArithmeticModel {
    /// Code `symbol` and update the model.
    fn encode(&mut self, symbol: u8, coder: &mut IntervalEncoder) -> Result<()>;

    /// Decode a symbol and update the model.
    fn decode(&mut self, coder: &mut IntervalDecoder<'_>) -> Result<u8>;
}

impl<M: ArithmeticModel + ?Sized> ArithmeticModel for &mut M {
    fn encode(&mut self, symbol: u8, coder: &mut IntervalEncoder) -> Result<()> {
        (**self).encode(symbol, coder)
    }

    fn decode(&mut self, coder: &mut IntervalDecoder<'_>) -> Result<u8> {
        (**self).decode(coder)
    }
}

/// Interval and free-end bookkeeping shared by both coder sides.
#[derive(Debug, Clone)]
pub(crate) struct Interval {
    pub(crate) low: u32,
    pub(crate) range: u32,
    /// Significant bits currently held in `low`.
    pub(crate) bits: u32,
    /// Low-order mask; every free end has these bits clear.
    pub(crate) even: u32,
    /// Next free end: 0, or `(even + 1) * (2x + 1)`.
    pub(crate) next_free_end: u32,
}

impl Default for Interval {
    fn default() -> Self {
        Self {
            low: 0,
            range: MAXRANGE,
            bits: MAXRANGE_BITS,
            even: MAXRANGE_MASK,
            next_free_end: 0,
        }
    }
}

impl Interval {
    /// Reserve the current free end: the stream does not stop here.
    #[inline]
    pub(crate) fn reserve_free_end(&mut self) {
        self.next_free_end = if self.next_free_end != 0 {
            self.next_free_end.wrapping_add((self.even + 1) << 1)
        } else {
            self.even + 1
        };
    }

    /// Apply the event `[sym_low, sym_high)` out of `p1` to `low`/`range`.
    /// Returns the offset added to `low`.
    #[inline]
    pub(crate) fn apply(&mut self, p1: u32, sym_low: u32, sym_high: u32) -> Result<u32> {
        if p1 == 0 || p1 >= MAXP1 || sym_low >= sym_high || sym_high > p1 {
            return Err(self.invariant("event outside [0, p1)"));
        }
        let new_low = mul_add_div(sym_low, self.range, 0, p1);
        let new_high = mul_add_div(sym_high, self.range, 0, p1);
        if new_high <= new_low {
            return Err(self.invariant("empty interval"));
        }
        self.range = new_high - new_low;
        self.low += new_low;
        if self.next_free_end < self.low {
            self.next_free_end = self.smallest_free_end();
        }
        Ok(new_low)
    }

    /// Whether `range` has to be doubled.
    #[inline]
    pub(crate) fn needs_scaling(&self) -> bool {
        self.range <= MAXRANGE >> 1
    }

    /// Double the interval and loosen the free end's evenness by one bit.
    #[inline]
    pub(crate) fn double(&mut self) {
        self.low <<= 1;
        self.range <<= 1;
        self.next_free_end = self.next_free_end.wrapping_shl(1);
        self.even = (self.even << 1) | 1;
    }

    /// Count one doubling; when a whole byte has accumulated above the
    /// significant bits, strip it from the state and return it (possibly
    /// with a carry into bit 8).
    #[inline]
    pub(crate) fn take_byte(&mut self) -> Option<u32> {
        self.bits += 1;
        if self.bits != SHIFT_OUT_BITS {
            return None;
        }
        let top = self.low & !MAXRANGE_MASK;
        self.low -= top;
        self.next_free_end = self.next_free_end.wrapping_sub(top);
        // only one value this even can lie in the interval
        self.even &= MAXRANGE_MASK;
        self.bits -= 8;
        Some(top >> MAXRANGE_BITS)
    }

    /// Reduce evenness until the free end lies in `[low, low + range)`.
    #[inline]
    pub(crate) fn fit_free_end(&mut self) -> Result<()> {
        while self.next_free_end.wrapping_sub(self.low) >= self.range {
            if self.even == 0 {
                return Err(self.invariant("free end outside interval"));
            }
            self.even >>= 1;
            self.next_free_end = self.smallest_free_end();
        }
        Ok(())
    }

    /// Smallest value `>= low` with the required oddness.
    #[inline]
    fn smallest_free_end(&self) -> u32 {
        (self.low.wrapping_add(self.even) & !self.even) | (self.even + 1)
    }

    pub(crate) fn invariant(&self, what: &'static str) -> BicomError {
        BicomError::CoderInvariant {
            what,
            low: self.low,
            range: self.range,
        }
    }
}
