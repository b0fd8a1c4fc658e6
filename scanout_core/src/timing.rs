// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame timing prediction.
//!
//! This module defines the values that flow from the frame-time manager to
//! pose sampling and time-warp:
//!
//! - [`TimingInputs`]: the measured or static scalars a prediction is built
//!   from
//! - [`Timing`]: absolute predicted times for one frame
//! - [`Eye`]: index into the per-eye arrays of a [`Timing`]
//!
//! # Data flow
//!
//! 1. [`FrameTimeManager::begin_frame()`](crate::manager::FrameTimeManager::begin_frame)
//!    samples the clock and recomputes [`TimingInputs`] from its filters.
//! 2. [`Timing::from_inputs()`] turns the inputs and the display's
//!    [`ShutterGeometry`] into absolute times.
//! 3. The manager publishes the [`Timing`]; readers on other threads fetch
//!    it or extrapolate it to future frames.
//! 4. The eye-pose sampler asks for poses at
//!    [`eye_render_times`](Timing::eye_render_times); time-warp asks for
//!    poses at both ends of
//!    [`timewarp_start_end_times`](Timing::timewarp_start_end_times).
//!
//! # Frame anatomy
//!
//! ```text
//!  this_frame_time      next_frame_time   base = next + screen_delay
//!        │ render ...          │                │   scan-out ...   │
//!        ├─────────────────────┼────────────────┼────────┬─────────┤
//!                        ▲     │                         │
//!         timewarp_point_time  │                   midpoint_time
//!         (next + wait delta)  │
//! ```

use crate::display::{ShutterGeometry, ShutterType};

/// Which eye a per-eye value belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Eye {
    /// Left eye (index 0).
    Left,
    /// Right eye (index 1).
    Right,
}

impl Eye {
    /// Both eyes, in index order.
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    /// Array index of this eye.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// Scalars a frame's prediction is computed from. All values in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimingInputs {
    /// Interval between frames: measured cadence or the nominal refresh.
    pub frame_delta: f64,
    /// Delay from the frame's vsync until its pixels are perceived.
    pub screen_delay: f64,
    /// Non-positive lead before `next_frame_time` at which time-warp starts;
    /// `0.0` when time-warp is not used.
    pub timewarp_wait_delta: f64,
}

/// Predicted absolute times (seconds, on the manager's clock) for one frame.
///
/// A `Timing` with `this_frame_time == 0.0` describes a frame that has not
/// begun yet; only its [`inputs`](Self::inputs) and
/// [`frame_index`](Self::frame_index) are meaningful.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Timing {
    /// Inputs the times below were derived from.
    pub inputs: TimingInputs,
    /// Index of the frame that started at `this_frame_time`.
    pub frame_index: u64,
    /// When the frame began.
    pub this_frame_time: f64,
    /// The vsync the frame is expected to be presented on.
    pub next_frame_time: f64,
    /// When time-warp should start for this frame.
    pub timewarp_point_time: f64,
    /// Middle of the frame's scan-out.
    pub midpoint_time: f64,
    /// When each eye's pixels are expected to be seen, for pose sampling.
    pub eye_render_times: [f64; 2],
    /// Per eye, the times at which the first and last column / row of the
    /// time-warp mesh become visible.
    pub timewarp_start_end_times: [[f64; 2]; 2],
}

impl Timing {
    /// Timing for a frame that has not begun.
    #[must_use]
    pub fn pending(inputs: TimingInputs, frame_index: u64) -> Self {
        Self {
            inputs,
            frame_index,
            ..Self::default()
        }
    }

    /// Builds the prediction for a frame starting at `this_frame_time`.
    ///
    /// Global shutters see both eyes at the scan-out midpoint with a
    /// zero-length time-warp window. Top-to-bottom rolling shutters see both
    /// eyes at the midpoint and warp across the whole scan. Left/right
    /// rolling shutters see the first-scanned eye a quarter frame into the
    /// scan and the second eye [`eye_scan_offset`] later; each eye warps over
    /// half a frame, the second eye's window shifted by the same offset.
    ///
    /// [`eye_scan_offset`]: ShutterGeometry::eye_scan_offset
    #[must_use]
    pub fn from_inputs(
        inputs: &TimingInputs,
        shutter: &ShutterGeometry,
        this_frame_time: f64,
        frame_index: u64,
    ) -> Self {
        let frame_delta = inputs.frame_delta;
        let next_frame_time = this_frame_time + frame_delta;
        let base = next_frame_time + inputs.screen_delay;
        let midpoint_time = base + frame_delta * 0.5;
        let offset = shutter.eye_scan_offset;

        let (eye_render_times, timewarp_start_end_times) = match shutter.shutter_type {
            ShutterType::Global => ([midpoint_time; 2], [[midpoint_time; 2]; 2]),
            ShutterType::RollingTopToBottom => {
                let window = [base, base + frame_delta];
                ([midpoint_time; 2], [window; 2])
            }
            ShutterType::RollingLeftToRight | ShutterType::RollingRightToLeft => {
                let first_eye = base + frame_delta * 0.25;
                let second_eye = first_eye + offset;
                let half = frame_delta * 0.5;
                let first_window = [base, base + half];
                let second_window = [base + offset, base + offset + half];
                if shutter.shutter_type == ShutterType::RollingLeftToRight {
                    ([first_eye, second_eye], [first_window, second_window])
                } else {
                    ([second_eye, first_eye], [second_window, first_window])
                }
            }
        };

        Self {
            inputs: *inputs,
            frame_index,
            this_frame_time,
            next_frame_time,
            timewarp_point_time: next_frame_time + inputs.timewarp_wait_delta,
            midpoint_time,
            eye_render_times,
            timewarp_start_end_times,
        }
    }

    /// Returns `true` once the frame has begun.
    #[must_use]
    pub fn has_begun(&self) -> bool {
        self.this_frame_time != 0.0
    }

    /// Predicted time `eye` is seen.
    #[must_use]
    pub const fn eye_render_time(&self, eye: Eye) -> f64 {
        self.eye_render_times[eye.index()]
    }

    /// Time-warp window `[start, end]` for `eye`.
    #[must_use]
    pub const fn timewarp_window(&self, eye: Eye) -> [f64; 2] {
        self.timewarp_start_end_times[eye.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn inputs() -> TimingInputs {
        TimingInputs {
            frame_delta: 0.0125,
            screen_delay: 0.015,
            timewarp_wait_delta: -0.004,
        }
    }

    fn geometry(shutter_type: ShutterType, eye_scan_offset: f64) -> ShutterGeometry {
        ShutterGeometry {
            shutter_type,
            eye_scan_offset,
        }
    }

    #[test]
    fn anchors_follow_inputs() {
        let t = Timing::from_inputs(&inputs(), &geometry(ShutterType::Global, 0.0), 10.0, 7);
        assert_eq!(t.frame_index, 7);
        assert_eq!(t.this_frame_time, 10.0);
        assert!((t.next_frame_time - 10.0125).abs() < EPS);
        assert!((t.timewarp_point_time - (10.0125 - 0.004)).abs() < EPS);
        // Scan-out starts at next + screen_delay; midpoint is half a frame in.
        assert!((t.midpoint_time - (10.0125 + 0.015 + 0.00625)).abs() < EPS);
        assert!(t.has_begun());
    }

    #[test]
    fn next_minus_this_is_frame_delta() {
        let t = Timing::from_inputs(&inputs(), &geometry(ShutterType::Global, 0.0), 1234.5, 0);
        assert!((t.next_frame_time - t.this_frame_time - t.inputs.frame_delta).abs() < 1e-9);
    }

    #[test]
    fn zero_wait_delta_warps_at_vsync() {
        let mut i = inputs();
        i.timewarp_wait_delta = 0.0;
        let t = Timing::from_inputs(&i, &geometry(ShutterType::Global, 0.0), 1.0, 0);
        assert_eq!(t.timewarp_point_time, t.next_frame_time);
    }

    #[test]
    fn global_shutter_sees_both_eyes_together() {
        let t = Timing::from_inputs(&inputs(), &geometry(ShutterType::Global, 0.0), 1.0, 0);
        assert_eq!(t.eye_render_time(Eye::Left), t.eye_render_time(Eye::Right));
        assert_eq!(t.eye_render_time(Eye::Left), t.midpoint_time);
        for eye in Eye::BOTH {
            assert_eq!(t.timewarp_window(eye), [t.midpoint_time; 2]);
        }
    }

    #[test]
    fn top_to_bottom_warps_across_whole_scan() {
        let t = Timing::from_inputs(
            &inputs(),
            &geometry(ShutterType::RollingTopToBottom, 0.0),
            1.0,
            0,
        );
        let base = t.next_frame_time + t.inputs.screen_delay;
        assert_eq!(t.eye_render_time(Eye::Left), t.eye_render_time(Eye::Right));
        for eye in Eye::BOTH {
            let [start, end] = t.timewarp_window(eye);
            assert_eq!(start, base);
            assert!((end - start - t.inputs.frame_delta).abs() < EPS);
        }
    }

    #[test]
    fn left_to_right_offsets_right_eye() {
        let offset = 0.006;
        let t = Timing::from_inputs(
            &inputs(),
            &geometry(ShutterType::RollingLeftToRight, offset),
            1.0,
            0,
        );
        let left = t.eye_render_time(Eye::Left);
        let right = t.eye_render_time(Eye::Right);
        assert!((right - left - offset).abs() < EPS, "{left} vs {right}");

        let [l0, l1] = t.timewarp_window(Eye::Left);
        let [r0, r1] = t.timewarp_window(Eye::Right);
        assert!((r0 - l0 - offset).abs() < EPS);
        assert!((r1 - l1 - offset).abs() < EPS);
        assert!((l1 - l0 - t.inputs.frame_delta * 0.5).abs() < EPS);
    }

    #[test]
    fn right_to_left_offsets_left_eye() {
        let offset = 0.006;
        let t = Timing::from_inputs(
            &inputs(),
            &geometry(ShutterType::RollingRightToLeft, offset),
            1.0,
            0,
        );
        let left = t.eye_render_time(Eye::Left);
        let right = t.eye_render_time(Eye::Right);
        assert!((left - right - offset).abs() < EPS, "{left} vs {right}");
        assert!(t.timewarp_window(Eye::Right)[0] < t.timewarp_window(Eye::Left)[0]);
    }

    #[test]
    fn half_frame_offset_matches_quarter_points() {
        // A scan that covers the whole frame puts the eyes at 1/4 and 3/4.
        let i = inputs();
        let t = Timing::from_inputs(
            &i,
            &geometry(ShutterType::RollingLeftToRight, i.frame_delta * 0.5),
            2.0,
            0,
        );
        let base = t.next_frame_time + i.screen_delay;
        assert!((t.eye_render_time(Eye::Left) - (base + i.frame_delta * 0.25)).abs() < EPS);
        assert!((t.eye_render_time(Eye::Right) - (base + i.frame_delta * 0.75)).abs() < EPS);
    }

    #[test]
    fn pending_timing_has_not_begun() {
        let t = Timing::pending(inputs(), 3);
        assert!(!t.has_begun());
        assert_eq!(t.frame_index, 3);
        assert_eq!(t.inputs, inputs());
    }
}
