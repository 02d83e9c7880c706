//! Streaming moments accumulator
//!
//! Decodes a job's bytes as little-endian f64 samples and accumulates the count,
//! mean and the second to fourth central-moment sums in a single pass. Per-job
//! accumulators are merged with the pairwise update formulas, so the order in
//! which jobs complete does not matter.
//!
//! Non-finite and subnormal samples are skipped and counted separately.
//!
//! # Example
//!
//! ```
//! use distscan::analysis::moments::MomentsAccumulator;
//!
//! let mut left = MomentsAccumulator::new();
//! let mut right = MomentsAccumulator::new();
//! for x in [1.0, 2.0, 3.0] { left.push(x); }
//! for x in [4.0, 5.0] { right.push(x); }
//!
//! let all = left.merge(&right);
//! assert_eq!(all.count(), 5);
//! assert!((all.mean() - 3.0).abs() < 1e-12);
//! assert!((all.variance().unwrap() - 2.5).abs() < 1e-12);
//! ```

use super::Analyzer;
use serde::{Deserialize, Serialize};

/// Size of one encoded sample in bytes
pub const SAMPLE_SIZE: usize = std::mem::size_of::<f64>();

#[inline]
fn usable(x: f64) -> bool {
    x == 0.0 || x.is_normal()
}

/// Running count, mean and central-moment sums of a sample stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentsAccumulator {
    n: u64,
    m1: f64,
    m2: f64,
    m3: f64,
    m4: f64,
    min: f64,
    max: f64,
    /// Every accepted sample had an integral value
    integer_only: bool,
    /// Samples rejected as non-finite or subnormal
    skipped: u64,
    /// A merge produced non-finite moments and one side was kept instead
    numerical_error: bool,
}

impl Default for MomentsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl MomentsAccumulator {
    pub fn new() -> Self {
        Self {
            n: 0,
            m1: 0.0,
            m2: 0.0,
            m3: 0.0,
            m4: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            integer_only: true,
            skipped: 0,
            numerical_error: false,
        }
    }

    /// Accumulate every sample encoded in `bytes`
    ///
    /// Trailing bytes that do not form a whole sample are ignored.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let mut acc = Self::new();
        for sample in bytes.chunks_exact(SAMPLE_SIZE) {
            let mut raw = [0u8; SAMPLE_SIZE];
            raw.copy_from_slice(sample);
            acc.push(f64::from_le_bytes(raw));
        }
        acc
    }

    /// Add one sample
    pub fn push(&mut self, x: f64) {
        if !usable(x) {
            self.skipped += 1;
            return;
        }

        self.integer_only = self.integer_only && x.fract() == 0.0;
        self.min = self.min.min(x);
        self.max = self.max.max(x);

        let n1 = self.n as f64;
        self.n += 1;
        let n = self.n as f64;

        let delta = x - self.m1;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * n1;

        self.m1 += delta_n;
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;
    }

    /// Combine two accumulators as if all samples had been pushed into one
    ///
    /// If the combined moments are not finite, the valid side is returned with
    /// its `numerical_error` flag set.
    pub fn merge(&self, other: &Self) -> Self {
        if other.n == 0 {
            let mut out = *self;
            out.skipped += other.skipped;
            return out;
        }
        if self.n == 0 {
            let mut out = *other;
            out.skipped += self.skipped;
            return out;
        }

        let (na, nb) = (self.n as f64, other.n as f64);
        let n = na + nb;

        let delta = other.m1 - self.m1;
        let delta2 = delta * delta;
        let delta3 = delta2 * delta;
        let delta4 = delta2 * delta2;

        let mut out = Self {
            n: self.n + other.n,
            m1: (self.m1 * na + other.m1 * nb) / n,
            m2: self.m2 + other.m2 + delta2 * na * nb / n,
            m3: self.m3
                + other.m3
                + delta3 * na * nb * (na - nb) / (n * n)
                + 3.0 * delta * (na * other.m2 - nb * self.m2) / n,
            m4: self.m4
                + other.m4
                + delta4 * na * nb * (na * na - na * nb + nb * nb) / (n * n * n)
                + 6.0 * delta2 * (na * na * other.m2 + nb * nb * self.m2) / (n * n)
                + 4.0 * delta * (na * other.m3 - nb * self.m3) / n,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            integer_only: self.integer_only && other.integer_only,
            skipped: self.skipped + other.skipped,
            numerical_error: self.numerical_error || other.numerical_error,
        };

        if !out.is_valid() {
            let mut kept = if self.is_valid() { *self } else { *other };
            kept.numerical_error = true;
            kept.skipped = out.skipped;
            kept.min = out.min;
            kept.max = out.max;
            out = kept;
        }
        out
    }

    /// Fold any number of accumulators into one
    pub fn merge_all<'a>(parts: impl IntoIterator<Item = &'a MomentsAccumulator>) -> Self {
        parts
            .into_iter()
            .fold(Self::new(), |acc, part| acc.merge(part))
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn mean(&self) -> f64 {
        self.m1
    }

    pub fn min(&self) -> Option<f64> {
        (self.n > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.n > 0).then_some(self.max)
    }

    /// Sample variance, `None` with fewer than two samples
    pub fn variance(&self) -> Option<f64> {
        (self.n > 1).then(|| self.m2 / (self.n as f64 - 1.0))
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn skewness(&self) -> Option<f64> {
        (self.n > 1 && self.m2 > 0.0).then(|| (self.n as f64).sqrt() * self.m3 / self.m2.powf(1.5))
    }

    /// Excess kurtosis (0 for a normal distribution)
    pub fn kurtosis(&self) -> Option<f64> {
        (self.n > 1 && self.m2 > 0.0).then(|| self.n as f64 * self.m4 / (self.m2 * self.m2) - 3.0)
    }

    /// Whether every accepted sample was integral
    pub fn is_integer_only(&self) -> bool {
        self.integer_only
    }

    pub fn had_numerical_error(&self) -> bool {
        self.numerical_error
    }

    /// Whether all moment sums are finite
    pub fn is_valid(&self) -> bool {
        [self.m1, self.m2, self.m3, self.m4].iter().all(|&m| usable(m))
    }
}

/// Reference analyzer: one [`MomentsAccumulator`] per job
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentsAnalyzer;

impl Analyzer for MomentsAnalyzer {
    type Output = MomentsAccumulator;

    fn analyze(&self, bytes: &[u8]) -> anyhow::Result<MomentsAccumulator> {
        Ok(MomentsAccumulator::from_le_bytes(bytes))
    }
}
