//! Completion tracking
//!
//! One bit per unit index, stored in `u64` words. A bit goes from unset to set
//! exactly once and never back. Bits beyond `chunk_count` in the last word stay
//! zero so word-level counting never sees phantom units.
//!
//! Units whose job failed are still marked complete (the scan must terminate),
//! and are additionally recorded in a second bitmap so reports can tell them
//! apart.

use crate::error::ScanError;

#[inline]
fn words_for_bits(n: u64) -> usize {
    n.div_ceil(64) as usize
}

/// Bit-per-unit record of which units have been processed
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    /// Completed units
    done: Vec<u64>,

    /// Units that completed as part of a failed job
    failed: Vec<u64>,

    /// Number of addressable units
    chunk_count: u64,

    /// Set bits in `done`
    done_count: u64,

    /// Set bits in `failed`
    failed_count: u64,
}

impl CompletionTracker {
    /// Create a tracker with `chunk_count` unset bits
    pub fn new(chunk_count: u64) -> Self {
        let words = words_for_bits(chunk_count);
        Self {
            done: vec![0; words],
            failed: vec![0; words],
            chunk_count,
            done_count: 0,
            failed_count: 0,
        }
    }

    #[inline]
    fn locate(&self, unit: u64) -> Result<(usize, u64), ScanError> {
        if unit >= self.chunk_count {
            return Err(ScanError::UnitOutOfBounds {
                unit,
                chunk_count: self.chunk_count,
            });
        }
        Ok(((unit / 64) as usize, 1u64 << (unit % 64)))
    }

    /// Mark a unit as completed
    ///
    /// # Errors
    ///
    /// - [`ScanError::DoubleCompletion`] if the unit was already complete
    /// - [`ScanError::UnitOutOfBounds`] if `unit >= chunk_count`
    pub fn mark_complete(&mut self, unit: u64) -> Result<(), ScanError> {
        let (word, mask) = self.locate(unit)?;
        if self.done[word] & mask != 0 {
            return Err(ScanError::DoubleCompletion { unit });
        }
        self.done[word] |= mask;
        self.done_count += 1;
        Ok(())
    }

    /// Mark a unit as completed as part of a failed job
    pub fn mark_failed(&mut self, unit: u64) -> Result<(), ScanError> {
        self.mark_complete(unit)?;
        let (word, mask) = self.locate(unit)?;
        self.failed[word] |= mask;
        self.failed_count += 1;
        Ok(())
    }

    /// Whether a unit has been marked complete
    pub fn is_complete(&self, unit: u64) -> bool {
        match self.locate(unit) {
            Ok((word, mask)) => self.done[word] & mask != 0,
            Err(_) => false,
        }
    }

    /// Whether a unit completed as part of a failed job
    pub fn is_failed(&self, unit: u64) -> bool {
        match self.locate(unit) {
            Ok((word, mask)) => self.failed[word] & mask != 0,
            Err(_) => false,
        }
    }

    /// True iff every unit has been marked complete
    pub fn is_done(&self) -> bool {
        self.done_count == self.chunk_count
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn completed(&self) -> u64 {
        self.done_count
    }

    pub fn failed(&self) -> u64 {
        self.failed_count
    }

    pub fn remaining(&self) -> u64 {
        self.chunk_count - self.done_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_starts_empty() {
        let tracker = CompletionTracker::new(130);
        assert_eq!(tracker.completed(), 0);
        assert_eq!(tracker.remaining(), 130);
        assert!(!tracker.is_done());
        assert!((0..130).all(|u| !tracker.is_complete(u)));
    }

    #[test]
    fn test_tracker_done_is_monotonic() {
        let mut tracker = CompletionTracker::new(70);
        for unit in (0..70).rev() {
            assert!(!tracker.is_done());
            tracker.mark_complete(unit).unwrap();
        }
        assert!(tracker.is_done());

        // Further failing calls do not undo completion
        assert!(tracker.mark_complete(3).is_err());
        assert!(tracker.is_done());
    }

    #[test]
    fn test_tracker_double_completion() {
        let mut tracker = CompletionTracker::new(10);
        tracker.mark_complete(4).unwrap();

        let err = tracker.mark_complete(4).unwrap_err();
        assert!(matches!(err, ScanError::DoubleCompletion { unit: 4 }));
        assert!(err.is_invariant_violation());
        assert_eq!(tracker.completed(), 1);
    }

    #[test]
    fn test_tracker_out_of_bounds() {
        let mut tracker = CompletionTracker::new(64);
        let err = tracker.mark_complete(64).unwrap_err();
        assert!(matches!(err, ScanError::UnitOutOfBounds { unit: 64, chunk_count: 64 }));
        assert!(!tracker.is_complete(64));
    }

    #[test]
    fn test_tracker_failed_units() {
        let mut tracker = CompletionTracker::new(5);
        tracker.mark_failed(2).unwrap();
        tracker.mark_complete(0).unwrap();

        assert!(tracker.is_complete(2));
        assert!(tracker.is_failed(2));
        assert!(!tracker.is_failed(0));
        assert_eq!(tracker.failed(), 1);
        assert_eq!(tracker.completed(), 2);

        assert!(tracker.mark_failed(2).is_err());
        assert_eq!(tracker.failed(), 1);
    }

    #[test]
    fn test_tracker_empty_is_done() {
        let tracker = CompletionTracker::new(0);
        assert!(tracker.is_done());
    }
}
