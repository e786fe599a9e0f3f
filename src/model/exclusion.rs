//! Symbols ruled out while escaping through contexts.

/// Set of excluded bytes, remembering insertion order so the most recent
/// exclusions can be undone.
#[derive(Clone)]
pub struct ExclusionSet {
    mask: [bool; 256],
    order: [u8; 256],
    count: usize,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self {
            mask: [false; 256],
            order: [0; 256],
            count: 0,
        }
    }
}

impl ExclusionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude `symbol`. Returns `true` if it was not excluded before.
    #[inline]
    pub fn exclude(&mut self, symbol: u8) -> bool {
        if self.mask[symbol as usize] {
            return false;
        }
        self.mask[symbol as usize] = true;
        self.order[self.count] = symbol;
        self.count += 1;
        true
    }

    /// Whether `symbol` is excluded.
    #[inline]
    pub fn is_excluded(&self, symbol: u8) -> bool {
        self.mask[symbol as usize]
    }

    /// Remove every exclusion.
    pub fn clear(&mut self) {
        self.backup(self.count);
    }

    /// Undo the last `n` exclusions.
    pub fn backup(&mut self, n: usize) {
        for _ in 0..n.min(self.count) {
            self.count -= 1;
            self.mask[self.order[self.count] as usize] = false;
        }
    }

    /// Number of excluded symbols.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether nothing is excluded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Excluded symbols in ascending order.
    pub fn sorted(&self) -> Vec<u8> {
        let mut symbols = self.order[..self.count].to_vec();
        symbols.sort_unstable();
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclude_reports_new() {
        let mut set = ExclusionSet::new();
        assert!(set.exclude(9));
        assert!(!set.exclude(9));
        assert!(set.is_excluded(9));
        assert!(!set.is_excluded(10));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_backup_undoes_latest() {
        let mut set = ExclusionSet::new();
        for s in [200u8, 3, 77, 15] {
            set.exclude(s);
        }
        set.backup(2);
        assert_eq!(set.sorted(), vec![3, 200]);
        assert!(!set.is_excluded(77));
        set.clear();
        assert!(set.is_empty());
        assert!(!set.is_excluded(200));
    }

    #[test]
    fn test_all_symbols() {
        let mut set = ExclusionSet::new();
        for s in (0..=255u8).rev() {
            assert!(set.exclude(s));
        }
        assert_eq!(set.len(), 256);
        assert_eq!(set.sorted(), (0..=255u8).collect::<Vec<_>>());
    }
}
