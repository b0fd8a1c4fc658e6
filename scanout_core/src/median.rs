// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-window median filter for timing samples.
//!
//! [`MedianCollector`] keeps the [`CAPACITY`](MedianCollector::CAPACITY) most
//! recent samples in a circular buffer and answers median queries by sorting
//! a copy of the valid slots. The window is small enough that a full sort
//! beats any incremental structure.

/// Collects recent time deltas (in seconds) and reports their median.
///
/// Used for frame cadence, distortion render duration, and present-to-scan-out
/// delay. Samples land at `count % CAPACITY`, so once the buffer is full each
/// new sample replaces the oldest one.
#[derive(Clone, Debug)]
pub struct MedianCollector {
    samples: [f64; Self::CAPACITY],
    count: u64,
}

impl MedianCollector {
    /// Number of samples the median is computed over.
    pub const CAPACITY: usize = 12;

    /// Creates an empty collector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: [0.0; Self::CAPACITY],
            count: 0,
        }
    }

    /// Records a new sample, overwriting the oldest once the window is full.
    ///
    /// Negative and non-finite samples are ignored.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "slot index is always below CAPACITY"
    )]
    pub fn add_time_delta(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            return;
        }
        let slot = (self.count % Self::CAPACITY as u64) as usize;
        self.samples[slot] = seconds;
        self.count += 1;
    }

    /// Returns the median of the valid samples, or `0.0` when there are none.
    ///
    /// With an even number of samples this is the mean of the two middle
    /// values.
    #[must_use]
    pub fn median_time_delta(&self) -> f64 {
        let n = self.valid_count();
        if n == 0 {
            return 0.0;
        }
        let mut sorted = self.samples;
        let sorted = &mut sorted[..n];
        sorted.sort_unstable_by(f64::total_cmp);
        if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) * 0.5
        }
    }

    /// Discards all samples.
    ///
    /// The buffer is not scrubbed; stale slots are unreachable until they
    /// are overwritten again.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Number of samples accepted since the last [`clear`](Self::clear).
    ///
    /// Not capped at [`CAPACITY`](Self::CAPACITY); callers compare it against
    /// a threshold to decide whether the median can be trusted.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Number of samples currently in the window.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "only taken when count is below CAPACITY"
    )]
    pub const fn valid_count(&self) -> usize {
        if self.count < Self::CAPACITY as u64 {
            self.count as usize
        } else {
            Self::CAPACITY
        }
    }

    /// Returns `true` if no samples have been accepted since the last clear.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for MedianCollector {
    fn default() -> Self {
        Self::new()
    }
}
