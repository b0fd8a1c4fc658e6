// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Whole-session scenarios driven through the public API.

use std::sync::Arc;

use scanout_core::clock::{Clock, ManualClock};
use scanout_core::display::{DisplayInfo, ShutterInfo, ShutterType};
use scanout_core::latency::TrackerMode;
use scanout_core::manager::{FrameTimeConfig, FrameTimeManager};
use scanout_core::pose::{Pose, PredictedPose, Quat};
use scanout_core::readback::{DrawColor, ReadbackRecord, ReadbackRecordSet};
use scanout_core::timing::Eye;

const HZ90: f64 = 1.0 / 90.0;

fn display_90hz(shutter_type: ShutterType) -> DisplayInfo {
    DisplayInfo::new(ShutterInfo {
        shutter_type,
        vsync_to_next_vsync: HZ90,
        vsync_to_first_scanline: 0.000_05,
        first_scanline_to_last_scanline: 0.010,
        pixel_settle_time: 0.001,
        pixel_persistence: 0.003,
    })
}

fn session(shutter_type: ShutterType) -> (FrameTimeManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(10.0));
    let mut m = FrameTimeManager::new(FrameTimeConfig::new(), clock.clone());
    m.init(display_90hz(shutter_type)).unwrap();
    (m, clock)
}

#[test]
fn steady_90hz_cadence_predicts_next_vsync() {
    let (mut m, clock) = session(ShutterType::Global);
    for i in 0..12 {
        clock.advance(HZ90);
        m.begin_frame(i);
    }

    let t = *m.timing();
    assert_eq!(t.frame_index, 11);
    assert!((t.inputs.frame_delta - HZ90).abs() < 1e-9);
    assert!((t.next_frame_time - (clock.now() + HZ90)).abs() < 1e-9);

    // Switching delay (half settle + half persistence) plus the static
    // vsync-to-scan-out delay.
    let screen_delay = 0.002 + 0.013;
    assert!((t.inputs.screen_delay - screen_delay).abs() < 1e-12);

    let expected_eye = t.next_frame_time + screen_delay + HZ90 * 0.5;
    for eye in Eye::BOTH {
        assert!((m.eye_prediction_time(eye) - expected_eye).abs() < 1e-9);
    }
    let [start, end] = m.timewarp_predictions(Eye::Left);
    assert_eq!(start, end);
    assert!((start - expected_eye).abs() < 1e-9);
}

#[test]
fn right_to_left_panel_lights_right_eye_first() {
    let (mut m, clock) = session(ShutterType::RollingRightToLeft);
    for i in 0..6 {
        clock.advance(HZ90);
        m.begin_frame(i);
    }

    let right = m.eye_prediction_time(Eye::Right);
    let left = m.eye_prediction_time(Eye::Left);
    assert!((left - right - 0.005).abs() < 1e-12, "offset = {}", left - right);

    let [rs, re] = m.timewarp_predictions(Eye::Right);
    let [ls, le] = m.timewarp_predictions(Eye::Left);
    assert!((re - rs - HZ90 * 0.5).abs() < 1e-12);
    assert!((ls - rs - 0.005).abs() < 1e-12);
    assert!((le - re - 0.005).abs() < 1e-12);
}

#[test]
fn future_frames_continue_the_cadence() {
    let (mut m, clock) = session(ShutterType::Global);
    for i in 0..8 {
        clock.advance(HZ90);
        m.begin_frame(i);
    }
    let current = *m.timing();
    let reader = m.reader();

    let later = reader.frame_timing(current.frame_index + 3);
    let expected = current.next_frame_time + 2.0 * current.inputs.frame_delta;
    assert!((later.this_frame_time - expected).abs() < 1e-9);
    assert_eq!(reader.frame_timing(current.frame_index), current);
}

#[test]
fn latency_tracking_measures_the_whole_pipeline() {
    const SCANOUT: f64 = 0.018;
    let (mut m, clock) = session(ShutterType::Global);
    let mut seen: Vec<ReadbackRecord> = Vec::new();

    for i in 0..10 {
        let begun = m.begin_frame(i);
        let render_predictor = move |_: f64| PredictedPose {
            pose: Pose::default(),
            sample_time: begun,
        };
        let render_pose = m.eye_prediction_pose(&render_predictor, Eye::Left);
        let color = m.frame_latency_test_draw_color();

        clock.advance(0.006);
        let warp_sample = clock.now();
        let warp_predictor = move |_: f64| PredictedPose {
            pose: Pose {
                orientation: Quat::from_axis_angle([0.0, 1.0, 0.0], 0.01),
                position: [0.0; 3],
            },
            sample_time: warp_sample,
        };
        let matrices = m.timewarp_matrices(&warp_predictor, Eye::Left, &render_pose);
        assert!(matrices.iter().all(|t| t.is_finite()));

        clock.advance(0.002);
        m.end_frame();
        if color != DrawColor::NONE {
            seen.push(ReadbackRecord {
                color,
                time: clock.now() + SCANOUT,
            });
        }
        let report = ReadbackRecordSet::from_records(&seen);
        m.update_frame_latency_tracking_after_end_frame(color, &report);
        clock.advance(HZ90 - 0.008);
    }

    let tracker = m.latency_tracker();
    assert!(tracker.sample_count() >= 7, "{}", tracker.sample_count());
    assert_eq!(tracker.mode(), TrackerMode::WaitingForZeroes);

    let timings = m.latency_timings();
    assert!((f64::from(timings.scanout_median) - SCANOUT).abs() < 1e-5);
    // Render pose sampled at begin, tag seen 8 ms + scan-out later.
    assert!((f64::from(timings.render) - (0.008 + SCANOUT)).abs() < 1e-5);
    // Time-warp pose sampled 2 ms before end.
    assert!((f64::from(timings.timewarp) - (0.002 + SCANOUT)).abs() < 1e-5);

    let screen_delay = m.reader().timing().inputs.screen_delay;
    assert!((screen_delay - (0.002 + SCANOUT)).abs() < 1e-9);
}

#[test]
fn vsync_off_free_runs_from_now() {
    let (mut m, clock) = session(ShutterType::RollingLeftToRight);
    m.set_vsync(false);
    clock.advance(0.003);
    m.begin_frame(0);
    clock.advance(0.001);

    let free_running = m.static_delays().free_running_delay();
    let now = clock.now();
    let reader = m.reader();
    for eye in Eye::BOTH {
        assert!((reader.eye_prediction_time(eye) - (now + free_running)).abs() < 1e-12);
        assert_eq!(reader.timewarp_predictions(eye), [now + free_running; 2]);
    }
}

#[test]
fn reinit_starts_a_fresh_session() {
    let (mut m, clock) = session(ShutterType::Global);
    for i in 0..8 {
        clock.advance(0.010);
        m.begin_frame(i);
    }
    assert!((m.timing().inputs.frame_delta - 0.010).abs() < 1e-9);

    let mut slower = display_90hz(ShutterType::Global);
    slower.shutter.vsync_to_next_vsync = 1.0 / 60.0;
    m.reinit(slower).unwrap();
    assert!(!m.timing().has_begun());
    assert_eq!(m.timing().inputs.frame_delta, 1.0 / 60.0);
}

#[cfg(feature = "trace")]
mod traced {
    use super::*;
    use scanout_core::trace::{
        FrameBeginEvent, LatencySampleEvent, TraceSink, Tracer, TrackerModeEvent,
    };

    #[derive(Default)]
    struct Collect {
        begins: u32,
        samples: u32,
        modes: Vec<TrackerModeEvent>,
    }

    impl TraceSink for Collect {
        fn on_frame_begin(&mut self, _: &FrameBeginEvent) {
            self.begins += 1;
        }

        fn on_latency_sample(&mut self, _: &LatencySampleEvent) {
            self.samples += 1;
        }

        fn on_tracker_mode(&mut self, e: &TrackerModeEvent) {
            self.modes.push(*e);
        }
    }

    #[test]
    fn tracker_cycle_is_traced() {
        let (mut m, clock) = session(ShutterType::Global);
        let mut sink = Collect::default();
        let mut seen: Vec<ReadbackRecord> = Vec::new();

        for i in 0..10 {
            let mut tracer = Tracer::new(&mut sink);
            m.begin_frame_traced(i, &mut tracer);
            let color = m.frame_latency_test_draw_color();
            clock.advance(0.008);
            m.end_frame_traced(&mut tracer);
            if color != DrawColor::NONE {
                seen.push(ReadbackRecord {
                    color,
                    time: clock.now() + 0.02,
                });
            }
            let report = ReadbackRecordSet::from_records(&seen);
            m.update_frame_latency_tracking_after_end_frame_traced(color, &report, &mut tracer);
            clock.advance(0.003);
        }

        assert_eq!(sink.begins, 10);
        assert_eq!(sink.samples, 7);
        let entered: Vec<_> = sink.modes.iter().map(|e| e.to).collect();
        assert_eq!(
            entered,
            [TrackerMode::Matching, TrackerMode::WaitingForZeroes]
        );
    }
}
