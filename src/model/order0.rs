//! Order-0 fallback model.
//!
//! Used when no context of the suffix tree predicts the next byte. Counts
//! live in a binary heap of partial sums so both the cumulative count of a
//! symbol and the symbol at a cumulative position take `log2(256)` steps.
//!
//! Adaptation is windowed: a coded symbol adds 6 to its count, and as it
//! ages through four 1024-symbol bands its weight drops to 4, 3, 2 and
//! finally 0. Every symbol keeps a base count of 1 so nothing is ever
//! impossible.

use super::exclusion::ExclusionSet;
use crate::arith::{ArithmeticModel, IntervalCoder, IntervalDecoder, IntervalEncoder};
use crate::error::{BicomError, Result};

const SYMBOLS: usize = 256;
const HISTORY: usize = 4096;
const BAND: usize = HISTORY / 4;

/// Adaptive order-0 model over bytes.
#[derive(Clone)]
pub struct Order0Model {
    /// `heap[1]` is the total; leaves are at `SYMBOLS + symbol`.
    heap: [u32; 2 * SYMBOLS],
    history: Box<[Option<u8>; HISTORY]>,
    /// Band cursors into `history`, moving backwards.
    w0: usize,
    w1: usize,
    w2: usize,
    w3: usize,
}

impl Default for Order0Model {
    fn default() -> Self {
        let mut model = Self {
            heap: [0; 2 * SYMBOLS],
            history: Box::new([None; HISTORY]),
            w0: 0,
            w1: 0,
            w2: 0,
            w3: 0,
        };
        model.reset();
        model
    }
}

impl Order0Model {
    /// Model with a count of 1 for every byte.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything that was learned.
    pub fn reset(&mut self) {
        self.heap = [0; 2 * SYMBOLS];
        self.history.fill(None);
        self.w0 = 0;
        self.w1 = BAND;
        self.w2 = 2 * BAND;
        self.w3 = 3 * BAND;
        for symbol in 0..SYMBOLS {
            self.add(symbol, 1);
        }
    }

    /// Current weight of `symbol`.
    #[inline]
    pub fn count(&self, symbol: u8) -> u32 {
        self.heap[SYMBOLS + symbol as usize]
    }

    /// Sum of all weights.
    #[inline]
    pub fn total(&self) -> u32 {
        self.heap[1]
    }

    /// Code one symbol with the excluded symbols removed from the alphabet.
    ///
    /// When `coder` is decoding, `symbol` is ignored and the decoded symbol
    /// is returned; otherwise `symbol` is coded and returned. Does not
    /// update the model.
    pub fn code_excluding<C: IntervalCoder>(
        &self,
        symbol: u8,
        coder: &mut C,
        excl: &ExclusionSet,
    ) -> Result<u8> {
        let sorted = excl.sorted();
        let p1 = self.total() - sorted.iter().map(|&s| self.count(s)).sum::<u32>();
        let Some(mut p) = coder.target(p1) else {
            let below: u32 = sorted
                .iter()
                .filter(|&&s| s < symbol)
                .map(|&s| self.count(s))
                .sum();
            let low = self.cumulative(symbol) - below;
            coder.narrow(p1, low, low + self.count(symbol))?;
            return Ok(symbol);
        };

        // locate p as if nothing were excluded
        let mut i = 1;
        let mut low = 0u32;
        while i < SYMBOLS {
            i += i;
            if p - low >= self.heap[i] {
                low += self.heap[i];
                i += 1;
            }
        }
        p -= low;

        // then step over the weight of excluded symbols at or below it
        for &ex in &sorted {
            if ex as usize > i - SYMBOLS {
                break;
            }
            let weight = self.count(ex);
            p += weight;
            low = low.wrapping_sub(weight);
            while p >= self.heap[i] {
                p -= self.heap[i];
                low = low.wrapping_add(self.heap[i]);
                i += 1;
                if i >= 2 * SYMBOLS {
                    return Err(BicomError::ModelMismatch);
                }
            }
        }
        coder.narrow(p1, low, low + self.heap[i])?;
        Ok((i - SYMBOLS) as u8)
    }

    /// Record an occurrence of `symbol`.
    pub fn update(&mut self, symbol: u8) {
        self.w1 = back(self.w1);
        if let Some(s) = self.history[self.w1] {
            self.sub(s as usize, 2);
        }
        self.w2 = back(self.w2);
        if let Some(s) = self.history[self.w2] {
            self.sub(s as usize, 1);
        }
        self.w3 = back(self.w3);
        if let Some(s) = self.history[self.w3] {
            self.sub(s as usize, 1);
        }
        self.w0 = back(self.w0);
        if let Some(s) = self.history[self.w0] {
            self.sub(s as usize, 2);
        }
        self.history[self.w0] = Some(symbol);
        self.add(symbol as usize, 6);
    }

    /// Sum of the weights of all symbols below `symbol`.
    fn cumulative(&self, symbol: u8) -> u32 {
        let mut low = 0;
        let mut bit = SYMBOLS;
        let mut i = 1;
        while i < SYMBOLS {
            bit >>= 1;
            i += i;
            if symbol as usize & bit != 0 {
                low += self.heap[i];
                i += 1;
            }
        }
        low
    }

    fn add(&mut self, symbol: usize, n: u32) {
        let mut i = symbol + SYMBOLS;
        while i > 0 {
            self.heap[i] += n;
            i >>= 1;
        }
    }

    fn sub(&mut self, symbol: usize, n: u32) {
        let mut i = symbol + SYMBOLS;
        while i > 0 {
            self.heap[i] -= n;
            i >>= 1;
        }
    }
}

#[inline]
fn back(w: usize) -> usize {
    if w == 0 {
        HISTORY - 1
    } else {
        w - 1
    }
}

impl ArithmeticModel for Order0Model {
    fn encode(&mut self, symbol: u8, coder: &mut IntervalEncoder) -> Result<()> {
        self.code_excluding(symbol, coder, &ExclusionSet::new())?;
        self.update(symbol);
        Ok(())
    }

    fn decode(&mut self, coder: &mut IntervalDecoder<'_>) -> Result<u8> {
        let symbol = self.code_excluding(0, coder, &ExclusionSet::new())?;
        self.update(symbol);
        Ok(symbol)
    }
}
