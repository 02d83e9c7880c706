//! Randomized unit sequence
//!
//! This module provides the sequence generator: a uniformly random permutation
//! of the unit indices `[0, max)` that is served out in consecutive,
//! non-overlapping slices. Every index is handed out exactly once.
//!
//! # Exhaustion
//!
//! The cursor only ever moves forward. A request that would run past the end
//! of the permutation fails with [`ScanError::OutOfRange`] and leaves the cursor
//! untouched, so the caller can retry with [`SequenceGenerator::remaining`].
//! Such a failure is the normal end-of-sequence signal, not an error condition.
//!
//! # Example
//!
//! ```
//! use distscan::sequence::SequenceGenerator;
//!
//! let mut seq = SequenceGenerator::with_seed(5, 42);
//! let first = seq.next(2).unwrap();
//! let second = seq.next(2).unwrap();
//! assert!(seq.next(2).unwrap_err().is_exhaustion());
//!
//! let last = seq.next(seq.remaining()).unwrap();
//! assert_eq!(first.len() + second.len() + last.len(), 5);
//! ```

use crate::error::ScanError;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Single-use, seeded permutation of `[0, max)`
///
/// The permutation is materialized once at construction. Only [`next`] mutates
/// the generator; the underlying sequence is never exposed for indexing.
///
/// [`next`]: SequenceGenerator::next
#[derive(Debug)]
pub struct SequenceGenerator {
    /// Shuffled unit indices
    sequence: Vec<u64>,

    /// Number of indices already handed out
    cursor: usize,
}

impl SequenceGenerator {
    /// Create a generator over `[0, max)` shuffled with the given seed
    ///
    /// Same `max` and same `seed` always yield the same permutation.
    pub fn with_seed(max: u64, seed: u64) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut sequence: Vec<u64> = (0..max).collect();
        sequence.shuffle(&mut rng);

        Self { sequence, cursor: 0 }
    }

    /// Return the next `size` indices of the permutation
    ///
    /// `size == 0` is a no-op returning an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::OutOfRange`] if fewer than `size` indices remain.
    /// The cursor is not advanced in that case.
    pub fn next(&mut self, size: u64) -> Result<Vec<u64>, ScanError> {
        let remaining = self.remaining();
        if size > remaining {
            return Err(ScanError::OutOfRange {
                requested: size,
                remaining,
            });
        }

        let start = self.cursor;
        let end = start + size as usize;
        self.cursor = end;
        Ok(self.sequence[start..end].to_vec())
    }

    /// Total number of indices in the permutation
    pub fn len(&self) -> u64 {
        self.sequence.len() as u64
    }

    /// Whether the permutation is empty (`max == 0`)
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of indices already consumed
    pub fn consumed(&self) -> u64 {
        self.cursor as u64
    }

    /// Number of indices not yet handed out
    pub fn remaining(&self) -> u64 {
        (self.sequence.len() - self.cursor) as u64
    }

    /// Whether every index has been handed out
    pub fn is_exhausted(&self) -> bool {
        self.cursor == self.sequence.len()
    }
}
