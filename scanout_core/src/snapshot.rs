// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lock-free publication of the current frame timing.
//!
//! The render thread owns the [`FrameTimeManager`](crate::manager::FrameTimeManager)
//! and publishes a [`PublishedTiming`] after every change. Other threads hold
//! a [`FrameTimingReader`] and read consistent copies without ever blocking
//! the writer.
//!
//! # Protocol
//!
//! [`SnapshotCell`] is a sequence lock over plain atomic words:
//!
//! ```text
//!  writer:  seq = odd ─ fence(Release) ─ store words ─ seq = even (Release)
//!  reader:  s1 = seq (Acquire) ─ load words ─ fence(Acquire) ─ s2 = seq
//!           retry if s1 is odd or s1 != s2
//! ```
//!
//! Every word is an `AtomicU64`, so a torn read is merely discarded and
//! retried rather than being undefined behaviour.

use alloc::sync::Arc;
use core::fmt;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicU64, Ordering, fence};

use crate::clock::Clock;
use crate::display::{ShutterGeometry, ShutterType};
use crate::timing::{Eye, Timing, TimingInputs};

/// A single-writer, multi-reader sequence lock over `N` 64-bit words.
///
/// Only one thread may call [`store`](Self::store) at a time; any number of
/// threads may call [`load`](Self::load) concurrently with it.
#[derive(Debug)]
pub struct SnapshotCell<const N: usize> {
    seq: AtomicU64,
    words: [AtomicU64; N],
}

impl<const N: usize> SnapshotCell<N> {
    /// Creates a cell holding `words`.
    #[must_use]
    pub fn new(words: [u64; N]) -> Self {
        Self {
            seq: AtomicU64::new(0),
            words: words.map(AtomicU64::new),
        }
    }

    /// Replaces the contents. Never waits.
    pub fn store(&self, words: &[u64; N]) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (slot, &w) in self.words.iter().zip(words) {
            slot.store(w, Ordering::Relaxed);
        }
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Returns a copy of the contents that was stored as a whole.
    ///
    /// Spins while a store is in progress.
    #[must_use]
    pub fn load(&self) -> [u64; N] {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before % 2 == 1 {
                spin_loop();
                continue;
            }
            let words = core::array::from_fn(|i| self.words[i].load(Ordering::Relaxed));
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return words;
            }
            spin_loop();
        }
    }

    /// Number of completed stores.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.seq.load(Ordering::Acquire) / 2
    }
}

/// Everything a reader needs to answer timing queries without the manager.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PublishedTiming {
    /// Timing of the most recently begun frame.
    pub timing: Timing,
    /// Shutter geometry of the display.
    pub shutter: ShutterGeometry,
    /// Whether presentation is synchronised to vsync.
    pub vsync: bool,
    /// Delay from "now" to visible pixels when not synchronised to vsync.
    pub free_running_delay: f64,
}

impl PublishedTiming {
    /// Encoded size in words.
    pub const WORDS: usize = 18;

    /// Packs into words: integer fields first, then every `f64` as raw bits.
    #[must_use]
    pub fn encode(&self) -> [u64; Self::WORDS] {
        let t = &self.timing;
        let [[l0, l1], [r0, r1]] = t.timewarp_start_end_times;
        let floats = [
            t.inputs.frame_delta,
            t.inputs.screen_delay,
            t.inputs.timewarp_wait_delta,
            t.this_frame_time,
            t.next_frame_time,
            t.timewarp_point_time,
            t.midpoint_time,
            t.eye_render_times[0],
            t.eye_render_times[1],
            l0,
            l1,
            r0,
            r1,
            self.shutter.eye_scan_offset,
            self.free_running_delay,
        ];
        let mut words = [0; Self::WORDS];
        words[0] = t.frame_index;
        words[1] = self.shutter.shutter_type.to_word();
        words[2] = u64::from(self.vsync);
        for (w, f) in words[3..].iter_mut().zip(floats) {
            *w = f.to_bits();
        }
        words
    }

    /// Inverse of [`encode`](Self::encode).
    #[must_use]
    pub fn decode(words: &[u64; Self::WORDS]) -> Self {
        let f = |i: usize| f64::from_bits(words[3 + i]);
        Self {
            timing: Timing {
                inputs: TimingInputs {
                    frame_delta: f(0),
                    screen_delay: f(1),
                    timewarp_wait_delta: f(2),
                },
                frame_index: words[0],
                this_frame_time: f(3),
                next_frame_time: f(4),
                timewarp_point_time: f(5),
                midpoint_time: f(6),
                eye_render_times: [f(7), f(8)],
                timewarp_start_end_times: [[f(9), f(10)], [f(11), f(12)]],
            },
            shutter: ShutterGeometry {
                shutter_type: ShutterType::from_word(words[1]),
                eye_scan_offset: f(13),
            },
            vsync: words[2] != 0,
            free_running_delay: f(14),
        }
    }

    /// Timing for `frame_index`, as seen from time `now`.
    ///
    /// The published frame is returned as is. Later frames continue from its
    /// `next_frame_time` in steps of `frame_delta`. Earlier frames, and any
    /// frame while nothing has begun yet, start at `now`.
    #[must_use]
    pub fn frame_timing(&self, frame_index: u64, now: f64) -> Timing {
        let t = &self.timing;
        if t.has_begun() && frame_index == t.frame_index {
            return *t;
        }
        let start = if t.has_begun() && frame_index > t.frame_index {
            let ahead = frame_index - t.frame_index - 1;
            t.next_frame_time + ahead as f64 * t.inputs.frame_delta
        } else {
            now
        };
        Timing::from_inputs(&t.inputs, &self.shutter, start, frame_index)
    }

    /// When `eye` of the current frame is expected to be seen.
    #[must_use]
    pub fn eye_prediction_time(&self, eye: Eye, now: f64) -> f64 {
        if self.vsync {
            self.timing.eye_render_time(eye)
        } else {
            now + self.free_running_delay
        }
    }

    /// Time-warp window `[start, end]` of `eye` for the current frame.
    #[must_use]
    pub fn timewarp_predictions(&self, eye: Eye, now: f64) -> [f64; 2] {
        if self.vsync {
            self.timing.timewarp_window(eye)
        } else {
            [now + self.free_running_delay; 2]
        }
    }
}

/// Read-only, thread-safe view of a manager's published timing.
///
/// Obtained from [`FrameTimeManager::reader`](crate::manager::FrameTimeManager::reader);
/// cloning is an `Arc` bump.
#[derive(Clone)]
pub struct FrameTimingReader {
    cell: Arc<SnapshotCell<{ PublishedTiming::WORDS }>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for FrameTimingReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTimingReader")
            .field("version", &self.cell.version())
            .finish_non_exhaustive()
    }
}

impl FrameTimingReader {
    pub(crate) fn new(
        cell: Arc<SnapshotCell<{ PublishedTiming::WORDS }>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { cell, clock }
    }

    /// A consistent copy of everything published.
    #[must_use]
    pub fn snapshot(&self) -> PublishedTiming {
        PublishedTiming::decode(&self.cell.load())
    }

    /// Timing of the most recently begun frame.
    #[must_use]
    pub fn timing(&self) -> Timing {
        self.snapshot().timing
    }

    /// Timing for `frame_index`; see [`PublishedTiming::frame_timing`].
    #[must_use]
    pub fn frame_timing(&self, frame_index: u64) -> Timing {
        self.snapshot().frame_timing(frame_index, self.clock.now())
    }

    /// See [`PublishedTiming::eye_prediction_time`].
    #[must_use]
    pub fn eye_prediction_time(&self, eye: Eye) -> f64 {
        self.snapshot().eye_prediction_time(eye, self.clock.now())
    }

    /// See [`PublishedTiming::timewarp_predictions`].
    #[must_use]
    pub fn timewarp_predictions(&self, eye: Eye) -> [f64; 2] {
        self.snapshot().timewarp_predictions(eye, self.clock.now())
    }

    /// Number of times the manager has published.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.cell.version()
    }
}
