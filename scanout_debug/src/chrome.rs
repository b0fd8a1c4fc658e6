// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Each frame becomes a complete (`"X"`) slice from its begin to its end on
//! the render track. Predicted eye times, latency samples, and tracker mode
//! changes are instant events on their own tracks, and the predicted inputs
//! are emitted as counters so their convergence can be plotted.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::pretty::{mode_name, reason_name};
use crate::recorder::{RecordedEvent, decode};

const TID_RENDER: u32 = 0;
const TID_PREDICTION: u32 = 1;
const TID_TRACKER: u32 = 2;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Clock times in seconds are converted to microseconds.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    // Begin of the frame whose end has not been seen yet.
    let mut open_frame: Option<(u64, f64)> = None;
    // Latest clock time seen in any event.
    let mut last_time = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::FrameBegin(e) => {
                open_frame = Some((e.frame_index, e.now));
                last_time = e.now;
                events.push(json!({
                    "ph": "C",
                    "name": "TimingInputs",
                    "ts": seconds_to_us(e.now),
                    "pid": 0,
                    "args": {
                        "frame_delta_ms": e.inputs.frame_delta * 1e3,
                        "screen_delay_ms": e.inputs.screen_delay * 1e3,
                        "timewarp_wait_ms": e.inputs.timewarp_wait_delta * 1e3,
                    }
                }));
                for (eye, time) in ["LeftEye", "RightEye"].into_iter().zip(e.eye_render_times) {
                    events.push(json!({
                        "ph": "i",
                        "name": eye,
                        "cat": "Prediction",
                        "ts": seconds_to_us(time),
                        "pid": 0,
                        "tid": TID_PREDICTION,
                        "s": "t",
                        "args": {
                            "frame_index": e.frame_index,
                        }
                    }));
                }
            }
            RecordedEvent::FrameEnd(e) => {
                let begin = match open_frame.take() {
                    Some((index, begin)) if index == e.frame_index => begin,
                    _ => e.end_time,
                };
                last_time = e.end_time;
                events.push(json!({
                    "ph": "X",
                    "name": "Frame",
                    "cat": "Render",
                    "ts": seconds_to_us(begin),
                    "dur": seconds_to_us(e.end_time - begin),
                    "pid": 0,
                    "tid": TID_RENDER,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::LatencySample(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Scanout",
                    "cat": "Latency",
                    "ts": seconds_to_us(e.scanout_time),
                    "pid": 0,
                    "tid": TID_TRACKER,
                    "s": "t",
                    "args": {
                        "color": e.color.index(),
                        "scanout_delay_ms": e.scanout_delay * 1e3,
                        "render_latency_ms": e.render_latency * 1e3,
                        "timewarp_latency_ms": e.timewarp_latency * 1e3,
                    }
                }));
            }
            RecordedEvent::TrackerMode(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "TrackerMode",
                    "cat": "Latency",
                    // Mode changes carry no time of their own; pin them to
                    // the latest event.
                    "ts": seconds_to_us(last_time),
                    "pid": 0,
                    "tid": TID_TRACKER,
                    "s": "t",
                    "args": {
                        "from": mode_name(e.from),
                        "to": mode_name(e.to),
                        "reason": reason_name(e.reason),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn seconds_to_us(seconds: f64) -> f64 {
    seconds * 1e6
}
