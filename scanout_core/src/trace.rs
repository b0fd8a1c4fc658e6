// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for frame timing and latency tracking.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! frame-time manager and the latency tracker call as they run. All method
//! bodies default to no-ops, so implementing only the events you care about
//! is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::latency::TrackerMode;
use crate::readback::DrawColor;
use crate::timing::TimingInputs;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why the latency tracker changed mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModeChangeReason {
    /// The tester reported an all-zero set; a new tag cycle starts.
    ZeroesSeen,
    /// Every saved tag of the cycle was matched.
    CycleComplete,
    /// Too many consecutive all-zero reports arrived while tags were pending.
    ZeroReportLimit,
    /// Pending tags outlived the timeout and were discarded.
    Expired,
    /// Tracking was disabled.
    Disabled,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a frame begins and its prediction is published.
#[derive(Clone, Copy, Debug)]
pub struct FrameBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Clock time captured at frame begin.
    pub now: f64,
    /// Inputs the prediction was built from.
    pub inputs: TimingInputs,
    /// Predicted time each eye is seen.
    pub eye_render_times: [f64; 2],
}

/// Emitted when rendering of a frame ends.
#[derive(Clone, Copy, Debug)]
pub struct FrameEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Clock time captured at frame end.
    pub end_time: f64,
}

/// Emitted for every tag matched against a readback with a positive delay.
#[derive(Clone, Copy, Debug)]
pub struct LatencySampleEvent {
    /// Tag that was matched.
    pub color: DrawColor,
    /// When rendering of the tagged frame ended.
    pub end_frame_time: f64,
    /// When the tester saw the tag.
    pub scanout_time: f64,
    /// `scanout_time - end_frame_time`, the sample fed to the median filter.
    pub scanout_delay: f64,
    /// Scan-out time minus the frame's render pose-sample time.
    pub render_latency: f64,
    /// Scan-out time minus the frame's time-warp pose-sample time.
    pub timewarp_latency: f64,
}

/// Emitted when the latency tracker switches mode.
#[derive(Clone, Copy, Debug)]
pub struct TrackerModeEvent {
    /// Mode before the switch.
    pub from: TrackerMode,
    /// Mode after the switch.
    pub to: TrackerMode,
    /// What caused the switch.
    pub reason: ModeChangeReason,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from frame timing.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called after a frame's timing is published.
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        _ = e;
    }

    /// Called when rendering of a frame ends.
    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        _ = e;
    }

    /// Called for every accepted latency sample.
    fn on_latency_sample(&mut self, e: &LatencySampleEvent) {
        _ = e;
    }

    /// Called when the latency tracker changes mode.
    fn on_tracker_mode(&mut self, e: &TrackerModeEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`FrameBeginEvent`].
    #[inline]
    pub fn frame_begin(&mut self, e: &FrameBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameEndEvent`].
    #[inline]
    pub fn frame_end(&mut self, e: &FrameEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LatencySampleEvent`].
    #[inline]
    pub fn latency_sample(&mut self, e: &LatencySampleEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_latency_sample(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TrackerModeEvent`].
    #[inline]
    pub fn tracker_mode(&mut self, e: &TrackerModeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_tracker_mode(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_begin() -> FrameBeginEvent {
        FrameBeginEvent {
            frame_index: 42,
            now: 1.0,
            inputs: TimingInputs {
                frame_delta: 1.0 / 90.0,
                screen_delay: 0.015,
                timewarp_wait_delta: -0.004,
            },
            eye_render_times: [1.03, 1.03],
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_frame_begin(&sample_begin());
        sink.on_frame_end(&FrameEndEvent {
            frame_index: 42,
            end_time: 1.008,
        });
        sink.on_tracker_mode(&TrackerModeEvent {
            from: TrackerMode::WaitingForZeroes,
            to: TrackerMode::Matching,
            reason: ModeChangeReason::ZeroesSeen,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.frame_begin(&sample_begin());
        tracer.frame_end(&FrameEndEvent {
            frame_index: 0,
            end_time: 0.0,
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            begins: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
                self.begins.push(e.frame_index);
            }
        }

        let mut sink = RecordingSink { begins: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.frame_begin(&sample_begin());
        // Access sink after tracer is dropped.
        drop(tracer);
        assert_eq!(sink.begins, &[42]);
    }
}
