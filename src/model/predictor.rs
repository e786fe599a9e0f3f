//! Adaptive binary predictors for escape events.

/// Sum of counts at which both counts are halved.
const HALVE_AT: u32 = 4096;

/// Hit/miss counter estimating the probability that a context predicts
/// the next symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitPredictor {
    /// Weight of "the prediction was right".
    pub hit: u32,
    /// Weight of "escape".
    pub miss: u32,
}

impl BitPredictor {
    /// Predictor with the given initial counts.
    pub const fn new(hit: u32, miss: u32) -> Self {
        Self { hit, miss }
    }

    /// Total weight; the `p1` the predictor codes with.
    #[inline]
    pub fn total(&self) -> u32 {
        self.hit + self.miss
    }

    /// Record an outcome. The step is `total / divisor + 1`, so the
    /// predictor adapts faster the more it has seen, until halving.
    #[inline]
    pub fn adjust(&mut self, hit: bool, divisor: u32) {
        let step = self.total() / divisor + 1;
        if hit {
            self.hit += step;
        } else {
            self.miss += step;
        }
        if self.total() >= HALVE_AT {
            self.hit = (self.hit + 1) >> 1;
            self.miss = (self.miss + 1) >> 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_raise_ratio() {
        let mut p = BitPredictor::new(10, 10);
        let mut last = p.hit as f64 / p.total() as f64;
        // stay below the halving threshold so rounding cannot interfere
        for _ in 0..20 {
            p.adjust(true, 128);
            let ratio = p.hit as f64 / p.total() as f64;
            assert!(ratio > last);
            last = ratio;
        }
        assert_eq!(p.miss, 10);
    }

    #[test]
    fn test_total_stays_bounded() {
        let mut p = BitPredictor::new(63, 1);
        for i in 0..100_000u32 {
            p.adjust(i % 7 != 0, 128);
            assert!(p.total() < HALVE_AT);
            assert!(p.hit >= 1 && p.miss >= 1);
        }
    }

    #[test]
    fn test_step_grows_with_total() {
        let mut p = BitPredictor::new(1000, 1000);
        p.adjust(false, 128);
        assert_eq!(p.miss, 1000 + 2000 / 128 + 1);
    }
}
