// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Clock times
//! are printed in seconds, durations in milliseconds.

use std::io::Write;

use scanout_core::latency::TrackerMode;
use scanout_core::trace::{
    FrameBeginEvent, FrameEndEvent, LatencySampleEvent, ModeChangeReason, TraceSink,
    TrackerModeEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn ms(seconds: f64) -> f64 {
    seconds * 1000.0
}

pub(crate) fn mode_name(mode: TrackerMode) -> &'static str {
    match mode {
        TrackerMode::WaitingForZeroes => "waiting",
        TrackerMode::Matching => "matching",
    }
}

pub(crate) fn reason_name(reason: ModeChangeReason) -> &'static str {
    match reason {
        ModeChangeReason::ZeroesSeen => "zeroes-seen",
        ModeChangeReason::CycleComplete => "cycle-complete",
        ModeChangeReason::ZeroReportLimit => "zero-report-limit",
        ModeChangeReason::Expired => "expired",
        ModeChangeReason::Disabled => "disabled",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[begin] frame={} now={:.6}s delta={:.3}ms screen={:.3}ms wait={:.3}ms \
             eyes=[{:.6}s {:.6}s]",
            e.frame_index,
            e.now,
            ms(e.inputs.frame_delta),
            ms(e.inputs.screen_delay),
            ms(e.inputs.timewarp_wait_delta),
            e.eye_render_times[0],
            e.eye_render_times[1],
        );
    }

    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        let _ = writeln!(
            self.writer,
            "[end] frame={} at {:.6}s",
            e.frame_index, e.end_time,
        );
    }

    fn on_latency_sample(&mut self, e: &LatencySampleEvent) {
        let _ = writeln!(
            self.writer,
            "[latency] color={} scanout={:.3}ms render={:.3}ms timewarp={:.3}ms",
            e.color.index(),
            ms(e.scanout_delay),
            ms(e.render_latency),
            ms(e.timewarp_latency),
        );
    }

    fn on_tracker_mode(&mut self, e: &TrackerModeEvent) {
        let _ = writeln!(
            self.writer,
            "[tracker] {} -> {} ({})",
            mode_name(e.from),
            mode_name(e.to),
            reason_name(e.reason),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanout_core::readback::DrawColor;
    use scanout_core::timing::TimingInputs;

    #[test]
    fn pretty_print_frame_begin() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_frame_begin(&FrameBeginEvent {
            frame_index: 1,
            now: 2.5,
            inputs: TimingInputs {
                frame_delta: 0.0125,
                screen_delay: 0.016,
                timewarp_wait_delta: 0.0,
            },
            eye_render_times: [2.535, 2.535],
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("[begin]"), "got: {output}");
        assert!(output.contains("frame=1"), "got: {output}");
        assert!(output.contains("delta=12.500ms"), "got: {output}");
    }

    #[test]
    fn pretty_print_latency_and_mode() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_latency_sample(&LatencySampleEvent {
            color: DrawColor::from_index(3).unwrap(),
            end_frame_time: 1.0,
            scanout_time: 1.02,
            scanout_delay: 0.02,
            render_latency: 0.031,
            timewarp_latency: 0.022,
        });
        sink.on_tracker_mode(&TrackerModeEvent {
            from: TrackerMode::Matching,
            to: TrackerMode::WaitingForZeroes,
            reason: ModeChangeReason::CycleComplete,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("color=3 scanout=20.000ms"), "got: {output}");
        assert!(
            output.contains("[tracker] matching -> waiting (cycle-complete)"),
            "got: {output}"
        );
    }
}
