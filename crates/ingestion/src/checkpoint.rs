//! Contiguous checkpoint watermark
//!
//! Records finish out of order when routed concurrently. The watermark is the
//! highest sequence `n` such that every record `1..=n` has completed, so a
//! restart from `watermark + 1` loses nothing.

use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct CheckpointTracker {
    watermark: u64,
    pending: BTreeSet<u64>,
}

impl CheckpointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `sequence` complete and return the new watermark
    pub fn complete(&mut self, sequence: u64) -> u64 {
        if sequence > self.watermark {
            self.pending.insert(sequence);
            while self.pending.remove(&(self.watermark + 1)) {
                self.watermark += 1;
            }
        }
        self.watermark
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    /// Completed records still above a gap
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    #[test]
    fn test_gap_holds_watermark() {
        let mut tracker = CheckpointTracker::new();
        assert_eq!(tracker.complete(2), 0);
        assert_eq!(tracker.complete(3), 0);
        assert_eq!(tracker.pending(), 2);
        assert_eq!(tracker.complete(1), 3);
        assert_eq!(tracker.pending(), 0);
        assert_eq!(tracker.complete(2), 3);
    }

    #[test]
    fn test_shuffled_completion_reaches_end() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut sequences: Vec<u64> = (1..=1000).collect();
        sequences.shuffle(&mut rng);

        let mut tracker = CheckpointTracker::new();
        let mut done = BTreeSet::new();
        for sequence in sequences {
            done.insert(sequence);
            let watermark = tracker.complete(sequence);
            let expected = (1..).take_while(|n| done.contains(n)).count() as u64;
            assert_eq!(watermark, expected);
        }
        assert_eq!(tracker.watermark(), 1000);
    }
}
