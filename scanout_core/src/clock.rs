// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic time sources.
//!
//! Every timestamp in this crate is an `f64` count of seconds on one
//! monotonic clock. The frame-time manager reads the clock through the
//! [`Clock`] trait so that tests and replays can drive time by hand with
//! [`ManualClock`].
//!
//! Clock values should be positive: a frame whose begin time is exactly
//! `0.0` is treated as not having begun.

use core::sync::atomic::{AtomicU64, Ordering};

/// A monotonic source of absolute time in seconds.
///
/// Shared between the render thread and readers, hence `Send + Sync`.
pub trait Clock: Send + Sync {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

/// A clock that only moves when told to.
///
/// The time is stored as `f64` bits in an atomic, so a test can advance a
/// shared clock from one thread while another reads it.
#[derive(Debug)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `seconds`.
    #[must_use]
    pub fn new(seconds: f64) -> Self {
        Self {
            bits: AtomicU64::new(seconds.to_bits()),
        }
    }

    /// Jumps to `seconds`.
    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    /// Moves the clock forward by `seconds` and returns the new time.
    pub fn advance(&self, seconds: f64) -> f64 {
        let prev = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + seconds).to_bits())
            })
            .unwrap_or_else(|bits| bits);
        f64::from_bits(prev) + seconds
    }
}

impl Default for ManualClock {
    /// Starts at one second, since a frame begun at `0.0` reads as not begun.
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Wall-clock-independent time since the clock was created, from
/// [`std::time::Instant`].
///
/// Starts at [`SystemClock::START`] rather than zero so that the first frame
/// never begins at `0.0`.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl SystemClock {
    /// Reading of a freshly created clock.
    pub const START: f64 = 1.0;

    /// Creates a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Self::START + self.epoch.elapsed().as_secs_f64()
    }
}
