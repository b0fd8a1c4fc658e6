// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, one tag byte followed by
//! the event's fields. Times are stored as raw `f64` bits. [`decode`] reads
//! them back as an iterator of [`RecordedEvent`].

use scanout_core::latency::TrackerMode;
use scanout_core::readback::DrawColor;
use scanout_core::timing::TimingInputs;
use scanout_core::trace::{
    FrameBeginEvent, FrameEndEvent, LatencySampleEvent, ModeChangeReason, TraceSink,
    TrackerModeEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_BEGIN: u8 = 1;
const TAG_FRAME_END: u8 = 2;
const TAG_LATENCY_SAMPLE: u8 = 3;
const TAG_TRACKER_MODE: u8 = 4;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_mode(&mut self, m: TrackerMode) {
        self.write_u8(match m {
            TrackerMode::WaitingForZeroes => 0,
            TrackerMode::Matching => 1,
        });
    }

    fn write_reason(&mut self, r: ModeChangeReason) {
        self.write_u8(match r {
            ModeChangeReason::ZeroesSeen => 0,
            ModeChangeReason::CycleComplete => 1,
            ModeChangeReason::ZeroReportLimit => 2,
            ModeChangeReason::Expired => 3,
            ModeChangeReason::Disabled => 4,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        self.write_u8(TAG_FRAME_BEGIN);
        self.write_u64(e.frame_index);
        self.write_f64(e.now);
        self.write_f64(e.inputs.frame_delta);
        self.write_f64(e.inputs.screen_delay);
        self.write_f64(e.inputs.timewarp_wait_delta);
        self.write_f64(e.eye_render_times[0]);
        self.write_f64(e.eye_render_times[1]);
    }

    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        self.write_u8(TAG_FRAME_END);
        self.write_u64(e.frame_index);
        self.write_f64(e.end_time);
    }

    fn on_latency_sample(&mut self, e: &LatencySampleEvent) {
        self.write_u8(TAG_LATENCY_SAMPLE);
        self.write_u8(e.color.index());
        self.write_f64(e.end_frame_time);
        self.write_f64(e.scanout_time);
        self.write_f64(e.scanout_delay);
        self.write_f64(e.render_latency);
        self.write_f64(e.timewarp_latency);
    }

    fn on_tracker_mode(&mut self, e: &TrackerModeEvent) {
        self.write_u8(TAG_TRACKER_MODE);
        self.write_mode(e.from);
        self.write_mode(e.to);
        self.write_reason(e.reason);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`FrameBeginEvent`].
    FrameBegin(FrameBeginEvent),
    /// A [`FrameEndEvent`].
    FrameEnd(FrameEndEvent),
    /// A [`LatencySampleEvent`].
    LatencySample(LatencySampleEvent),
    /// A [`TrackerModeEvent`].
    TrackerMode(TrackerModeEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first truncated record or unknown tag.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn read_u8(&mut self) -> Option<u8> {
        let v = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        let bytes = self.data.get(self.pos..self.pos + 8)?;
        let v = u64::from_le_bytes(bytes.try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }

    fn read_mode(&mut self) -> Option<TrackerMode> {
        Some(match self.read_u8()? {
            0 => TrackerMode::WaitingForZeroes,
            _ => TrackerMode::Matching,
        })
    }

    fn read_reason(&mut self) -> Option<ModeChangeReason> {
        Some(match self.read_u8()? {
            0 => ModeChangeReason::ZeroesSeen,
            1 => ModeChangeReason::CycleComplete,
            2 => ModeChangeReason::ZeroReportLimit,
            3 => ModeChangeReason::Expired,
            _ => ModeChangeReason::Disabled,
        })
    }

    fn decode_frame_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameBegin(FrameBeginEvent {
            frame_index: self.read_u64()?,
            now: self.read_f64()?,
            inputs: TimingInputs {
                frame_delta: self.read_f64()?,
                screen_delay: self.read_f64()?,
                timewarp_wait_delta: self.read_f64()?,
            },
            eye_render_times: [self.read_f64()?, self.read_f64()?],
        }))
    }

    fn decode_frame_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameEnd(FrameEndEvent {
            frame_index: self.read_u64()?,
            end_time: self.read_f64()?,
        }))
    }

    fn decode_latency_sample(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::LatencySample(LatencySampleEvent {
            color: DrawColor::from_index(self.read_u8()?)?,
            end_frame_time: self.read_f64()?,
            scanout_time: self.read_f64()?,
            scanout_delay: self.read_f64()?,
            render_latency: self.read_f64()?,
            timewarp_latency: self.read_f64()?,
        }))
    }

    fn decode_tracker_mode(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TrackerMode(TrackerModeEvent {
            from: self.read_mode()?,
            to: self.read_mode()?,
            reason: self.read_reason()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_FRAME_BEGIN => self.decode_frame_begin(),
            TAG_FRAME_END => self.decode_frame_end(),
            TAG_LATENCY_SAMPLE => self.decode_latency_sample(),
            TAG_TRACKER_MODE => self.decode_tracker_mode(),
            _ => None, // unknown tag → stop iteration
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
            frame_index: 7,
            now: 12.25,
            inputs: TimingInputs {
                frame_delta: 1.0 / 90.0,
                screen_delay: 0.016,
                timewarp_wait_delta: -0.004,
            },
            eye_render_times: [12.29, 12.295],
        }
    }

    fn sample_latency() -> LatencySampleEvent {
        LatencySampleEvent {
            color: DrawColor::from_index(5).unwrap(),
            end_frame_time: 12.26,
            scanout_time: 12.28,
            scanout_delay: 0.02,
            render_latency: 0.03,
            timewarp_latency: 0.021,
        }
    }

    #[test]
    fn frame_begin_keeps_exact_times() {
        let mut rec = RecorderSink::new();
        let orig = sample_begin();
        rec.on_frame_begin(&orig);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::FrameBegin(e) => {
                assert_eq!(e.frame_index, orig.frame_index);
                assert_eq!(e.now.to_bits(), orig.now.to_bits());
                assert_eq!(e.inputs, orig.inputs);
                assert_eq!(e.eye_render_times, orig.eye_render_times);
            }
            other => panic!("expected FrameBegin, got {other:?}"),
        }
    }

    #[test]
    fn mixed_events_decode_in_order() {
        let mut rec = RecorderSink::new();
        rec.on_frame_begin(&sample_begin());
        rec.on_frame_end(&FrameEndEvent {
            frame_index: 7,
            end_time: 12.26,
        });
        rec.on_tracker_mode(&TrackerModeEvent {
            from: TrackerMode::WaitingForZeroes,
            to: TrackerMode::Matching,
            reason: ModeChangeReason::ZeroesSeen,
        });
        rec.on_latency_sample(&sample_latency());

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], RecordedEvent::FrameBegin(_)));
        assert!(matches!(events[1], RecordedEvent::FrameEnd(_)));
        match &events[2] {
            RecordedEvent::TrackerMode(e) => {
                assert_eq!(e.to, TrackerMode::Matching);
                assert_eq!(e.reason, ModeChangeReason::ZeroesSeen);
            }
            other => panic!("expected TrackerMode, got {other:?}"),
        }
        match &events[3] {
            RecordedEvent::LatencySample(e) => {
                assert_eq!(e.color.index(), 5);
                assert_eq!(e.scanout_delay, 0.02);
            }
            other => panic!("expected LatencySample, got {other:?}"),
        }
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_frame_end(&FrameEndEvent {
            frame_index: 1,
            end_time: 1.0,
        });
        rec.on_latency_sample(&sample_latency());
        let bytes = rec.into_bytes();

        let events: Vec<_> = decode(&bytes[..bytes.len() - 3]).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RecordedEvent::FrameEnd(_)));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }
}
