// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame prediction with measured feedback.
//!
//! The [`FrameTimeManager`] turns the display descriptor, the measured frame
//! cadence, the measured distortion render time and the hardware-reported
//! scan-out delay into a [`Timing`] for every frame, and publishes it for
//! other threads through a [`FrameTimingReader`].
//!
//! # Feedback loops
//!
//! ```text
//!   begin_frame ──► cadence median ───────────► frame_delta
//!   add_distortion_time_measurement ──► median ► timewarp_wait_delta
//!   update_frame_latency_tracking_after_end_frame
//!        └─► LatencyTracker ──► scan-out median ► screen_delay
//! ```
//!
//! Each measured input falls back to a static value from
//! [`FrameTimeConfig`] until enough samples exist, and again whenever the
//! measurement looks implausible.

use alloc::sync::Arc;
use core::fmt;

use crate::clock::Clock;
use crate::display::{DisplayInfo, DisplayInfoError, ShutterGeometry};
use crate::latency::{LatencyTimings, LatencyTracker, TrackerConfig};
use crate::median::MedianCollector;
use crate::pose::{Pose, PosePredictor};
use crate::readback::{DrawColor, ReadbackRecordSet};
use crate::snapshot::{FrameTimingReader, PublishedTiming, SnapshotCell};
use crate::timing::{Eye, Timing, TimingInputs};
use crate::trace::{FrameBeginEvent, FrameEndEvent, Tracer};
use crate::transform::Transform3d;

/// Fallbacks and thresholds for the [`FrameTimeManager`]. Times in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTimeConfig {
    /// Vsync to scan-out delay assumed until the tracker has measured one.
    pub vsync_to_scanout_delay: f64,
    /// Present to scan-out delay when not synchronised to vsync.
    pub no_vsync_to_scanout_delay: f64,
    /// Cadence samples needed before the measured frame delta is used.
    pub min_cadence_samples: u64,
    /// How far the cadence median may exceed the nominal refresh interval
    /// before it is treated as missed frames and ignored.
    pub cadence_clamp_margin: f64,
    /// Tracker samples needed before the measured scan-out delay is used.
    pub min_latency_samples: u64,
    /// Measured scan-out delays at or below this are ignored.
    pub min_plausible_scanout_delay: f64,
    /// Measured scan-out delays at or above this are ignored.
    pub max_plausible_scanout_delay: f64,
    /// Distortion render-time samples needed before time-warp uses them.
    pub distortion_samples_needed: u64,
    /// Added to the distortion render-time median to get the time-warp lead.
    pub distortion_safety_margin: f64,
    /// Time-warp lead used until the distortion render time is known.
    pub default_timewarp_lead: f64,
    /// Latency tracker tuning.
    pub tracker: TrackerConfig,
}

impl FrameTimeConfig {
    /// Default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vsync_to_scanout_delay: 0.013,
            no_vsync_to_scanout_delay: 0.004,
            min_cadence_samples: 4,
            cadence_clamp_margin: 0.001,
            min_latency_samples: 4,
            min_plausible_scanout_delay: 0.000_1,
            max_plausible_scanout_delay: 0.06,
            distortion_samples_needed: 10,
            distortion_safety_margin: 0.002,
            default_timewarp_lead: 0.004,
            tracker: TrackerConfig::new(),
        }
    }

    /// Default configuration with hardware latency tracking switched off.
    #[must_use]
    pub const fn without_latency_tracking() -> Self {
        Self {
            tracker: TrackerConfig::disabled(),
            ..Self::new()
        }
    }
}

impl Default for FrameTimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Delays derived once from the display descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StaticDelays {
    /// Nominal refresh interval.
    pub refresh_interval: f64,
    /// Average time from a pixel being driven to it being perceived.
    pub screen_switching_delay: f64,
    /// Vsync to scan-out delay assumed without a measurement.
    pub vsync_to_scanout_delay: f64,
    /// Present to scan-out delay without vsync.
    pub no_vsync_to_scanout_delay: f64,
}

impl StaticDelays {
    /// Derives the delays for `display` under `config`.
    #[must_use]
    pub fn new(display: &DisplayInfo, config: &FrameTimeConfig) -> Self {
        Self {
            refresh_interval: display.shutter.vsync_to_next_vsync,
            screen_switching_delay: display.shutter.switching_delay(),
            vsync_to_scanout_delay: config.vsync_to_scanout_delay,
            no_vsync_to_scanout_delay: config.no_vsync_to_scanout_delay,
        }
    }

    /// Delay from "now" to visible pixels when not synchronised to vsync.
    #[must_use]
    pub fn free_running_delay(&self) -> f64 {
        self.screen_switching_delay + self.no_vsync_to_scanout_delay
    }
}

/// Predicts when each frame's pixels are seen and learns from measurements.
///
/// Owned and driven by the render thread:
///
/// 1. [`begin_frame`](Self::begin_frame) at the start of every frame.
/// 2. Pose queries ([`eye_prediction_pose`](Self::eye_prediction_pose),
///    [`timewarp_matrices`](Self::timewarp_matrices)) while rendering.
/// 3. [`end_frame`](Self::end_frame) once rendering is done.
/// 4. [`update_frame_latency_tracking_after_end_frame`](Self::update_frame_latency_tracking_after_end_frame)
///    with the frame's tag colour and the latest tester report.
///
/// Other threads read through [`reader`](Self::reader).
pub struct FrameTimeManager {
    config: FrameTimeConfig,
    clock: Arc<dyn Clock>,
    display: DisplayInfo,
    initialized: bool,
    shutter: ShutterGeometry,
    delays: StaticDelays,

    vsync: bool,
    dynamic_prediction: bool,
    sdk_render: bool,
    timewarp: bool,

    frame_deltas: MedianCollector,
    distortion_times: MedianCollector,
    tracker: LatencyTracker,

    timing: Timing,
    last_begin: Option<(u64, f64)>,
    end_frame_time: f64,
    render_pose_time: f64,
    timewarp_pose_time: f64,

    published: Arc<SnapshotCell<{ PublishedTiming::WORDS }>>,
}

impl fmt::Debug for FrameTimeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameTimeManager")
            .field("display", &self.display)
            .field("vsync", &self.vsync)
            .field("dynamic_prediction", &self.dynamic_prediction)
            .field("sdk_render", &self.sdk_render)
            .field("timewarp", &self.timewarp)
            .field("timing", &self.timing)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

impl FrameTimeManager {
    /// Creates a manager for a default 60 Hz display.
    ///
    /// Vsync and dynamic prediction start on, SDK rendering off, time-warp on.
    /// Call [`init`](Self::init) with the real display before the first frame.
    #[must_use]
    pub fn new(config: FrameTimeConfig, clock: Arc<dyn Clock>) -> Self {
        let display = DisplayInfo::default();
        let delays = StaticDelays::new(&display, &config);
        let mut manager = Self {
            config,
            clock,
            display,
            initialized: false,
            shutter: display.geometry(),
            delays,
            vsync: true,
            dynamic_prediction: true,
            sdk_render: false,
            timewarp: true,
            frame_deltas: MedianCollector::new(),
            distortion_times: MedianCollector::new(),
            tracker: LatencyTracker::new(config.tracker),
            timing: Timing::default(),
            last_begin: None,
            end_frame_time: 0.0,
            render_pose_time: 0.0,
            timewarp_pose_time: 0.0,
            published: Arc::new(SnapshotCell::new([0; PublishedTiming::WORDS])),
        };
        manager.timing = Timing::pending(manager.calc_inputs(), 0);
        manager.publish();
        manager
    }

    /// Configures the manager for `display`.
    ///
    /// Repeating the call with the same descriptor is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the descriptor is unusable, and
    /// [`DisplayInfoError::AlreadyInitialized`] if a different descriptor was
    /// already applied; use [`reinit`](Self::reinit) to switch displays.
    pub fn init(&mut self, display: DisplayInfo) -> Result<(), DisplayInfoError> {
        display.validate()?;
        if self.initialized {
            return if self.display == display {
                Ok(())
            } else {
                Err(DisplayInfoError::AlreadyInitialized)
            };
        }
        self.apply_display(display);
        Ok(())
    }

    /// Switches to a different display, discarding all measurements.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the descriptor is unusable; the
    /// previous display stays in effect.
    pub fn reinit(&mut self, display: DisplayInfo) -> Result<(), DisplayInfoError> {
        display.validate()?;
        self.apply_display(display);
        Ok(())
    }

    fn apply_display(&mut self, display: DisplayInfo) {
        self.display = display;
        self.initialized = true;
        self.shutter = display.geometry();
        self.delays = StaticDelays::new(&display, &self.config);
        self.reset_frame_timing(
            self.timing.frame_index,
            self.dynamic_prediction,
            self.sdk_render,
        );
    }

    /// Starts over at `frame_index`, discarding every measurement.
    ///
    /// `dynamic_prediction` enables the measured inputs; `sdk_render` says
    /// distortion is rendered here, which enables the time-warp lead.
    pub fn reset_frame_timing(&mut self, frame_index: u64, dynamic_prediction: bool, sdk_render: bool) {
        self.dynamic_prediction = dynamic_prediction;
        self.sdk_render = sdk_render;
        self.frame_deltas.clear();
        self.distortion_times.clear();
        self.tracker.reset();
        self.last_begin = None;
        self.end_frame_time = 0.0;
        self.render_pose_time = 0.0;
        self.timewarp_pose_time = 0.0;
        self.timing = Timing::pending(self.calc_inputs(), frame_index);
        self.publish();
    }

    /// Turns vsync on or off.
    pub fn set_vsync(&mut self, enabled: bool) {
        self.vsync = enabled;
        self.rebuild_timing();
        self.publish();
    }

    /// Turns distortion time-warp on or off.
    pub fn set_timewarp(&mut self, enabled: bool) {
        self.timewarp = enabled;
        self.refresh_inputs();
    }

    /// Starts frame `frame_index` and returns the clock time it began at.
    pub fn begin_frame(&mut self, frame_index: u64) -> f64 {
        self.begin_frame_traced(frame_index, &mut Tracer::none())
    }

    /// [`begin_frame`](Self::begin_frame) reporting to `tracer`.
    pub fn begin_frame_traced(&mut self, frame_index: u64, tracer: &mut Tracer<'_>) -> f64 {
        let now = self.clock.now();
        if let Some((prev_index, prev_time)) = self.last_begin
            && frame_index == prev_index.wrapping_add(1)
        {
            self.frame_deltas.add_time_delta(now - prev_time);
        }
        self.last_begin = Some((frame_index, now));
        self.end_frame_time = 0.0;
        self.render_pose_time = 0.0;
        self.timewarp_pose_time = 0.0;

        let inputs = self.calc_inputs();
        self.timing = Timing::from_inputs(&inputs, &self.shutter, now, frame_index);
        self.publish();
        tracer.frame_begin(&FrameBeginEvent {
            frame_index,
            now,
            inputs,
            eye_render_times: self.timing.eye_render_times,
        });
        now
    }

    /// Marks the end of rendering for the current frame.
    pub fn end_frame(&mut self) {
        self.end_frame_traced(&mut Tracer::none());
    }

    /// [`end_frame`](Self::end_frame) reporting to `tracer`.
    pub fn end_frame_traced(&mut self, tracer: &mut Tracer<'_>) {
        debug_assert!(self.timing.has_begun(), "end_frame without begin_frame");
        self.end_frame_time = self.clock.now();
        tracer.frame_end(&FrameEndEvent {
            frame_index: self.timing.frame_index,
            end_time: self.end_frame_time,
        });
    }

    /// Timing of the current frame.
    #[must_use]
    pub const fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Timing for any frame; see [`PublishedTiming::frame_timing`].
    #[must_use]
    pub fn frame_timing(&self, frame_index: u64) -> Timing {
        self.published_timing().frame_timing(frame_index, self.clock.now())
    }

    /// When `eye` of the current frame is expected to be seen.
    ///
    /// Without vsync this is "now" plus the free-running delay.
    #[must_use]
    pub fn eye_prediction_time(&self, eye: Eye) -> f64 {
        self.published_timing().eye_prediction_time(eye, self.clock.now())
    }

    /// Predicts the pose to render `eye` with.
    ///
    /// The sensor time of the first such prediction in a frame is kept for
    /// latency reporting.
    pub fn eye_prediction_pose(&mut self, predictor: &dyn PosePredictor, eye: Eye) -> Pose {
        let predicted = predictor.predict(self.eye_prediction_time(eye));
        if self.render_pose_time == 0.0 {
            self.render_pose_time = predicted.sample_time;
        }
        predicted.pose
    }

    /// Time-warp window `[start, end]` of `eye` for the current frame.
    #[must_use]
    pub fn timewarp_predictions(&self, eye: Eye) -> [f64; 2] {
        self.published_timing().timewarp_predictions(eye, self.clock.now())
    }

    /// Rotations that warp a frame rendered at `render_pose` to the poses
    /// predicted at both ends of `eye`'s time-warp window.
    ///
    /// The matrices are expressed in the distortion mesh's NDC basis. The
    /// sensor time of the first prediction in a frame is kept for latency
    /// reporting.
    pub fn timewarp_matrices(
        &mut self,
        predictor: &dyn PosePredictor,
        eye: Eye,
        render_pose: &Pose,
    ) -> [Transform3d; 2] {
        let inverse_render = render_pose.orientation.inverse();
        self.timewarp_predictions(eye).map(|time| {
            let predicted = predictor.predict(time);
            if self.timewarp_pose_time == 0.0 {
                self.timewarp_pose_time = predicted.sample_time;
            }
            Transform3d::from_quat(inverse_render * predicted.pose.orientation).to_ndc_basis()
        })
    }

    /// Returns `true` while the distortion render time is still being learnt.
    #[must_use]
    pub fn need_distortion_time_measurement(&self) -> bool {
        self.dynamic_prediction
            && self.sdk_render
            && self.distortion_times.count() < self.config.distortion_samples_needed
    }

    /// Records how long distortion rendering took, in seconds.
    pub fn add_distortion_time_measurement(&mut self, seconds: f64) {
        self.distortion_times.add_time_delta(seconds);
        self.refresh_inputs();
    }

    /// Tag colour to draw into the frame being rendered.
    pub fn frame_latency_test_draw_color(&mut self) -> DrawColor {
        self.tracker.next_draw_color()
    }

    /// Feeds the tracker after [`end_frame`](Self::end_frame): saves the
    /// frame's tag, expires a stale cycle, and matches the tester report.
    ///
    /// Republishes if the measured scan-out delay moved the prediction.
    pub fn update_frame_latency_tracking_after_end_frame(
        &mut self,
        color: DrawColor,
        readback: &ReadbackRecordSet,
    ) {
        self.update_frame_latency_tracking_after_end_frame_traced(
            color,
            readback,
            &mut Tracer::none(),
        );
    }

    /// [`update_frame_latency_tracking_after_end_frame`](Self::update_frame_latency_tracking_after_end_frame)
    /// reporting to `tracer`.
    pub fn update_frame_latency_tracking_after_end_frame_traced(
        &mut self,
        color: DrawColor,
        readback: &ReadbackRecordSet,
        tracer: &mut Tracer<'_>,
    ) {
        debug_assert!(
            self.end_frame_time != 0.0,
            "latency update without end_frame"
        );
        let end_frame_time = if self.end_frame_time != 0.0 {
            self.end_frame_time
        } else {
            self.clock.now()
        };
        if !color.is_untagged() {
            self.tracker.save_draw_color(
                color,
                end_frame_time,
                self.render_pose_time,
                self.timewarp_pose_time,
            );
        }
        self.tracker.expire_stale_traced(end_frame_time, tracer);
        self.tracker.match_record_traced(readback, tracer);
        self.refresh_inputs();
    }

    /// Latencies measured by the tracker, as of now.
    #[must_use]
    pub fn latency_timings(&self) -> LatencyTimings {
        self.tracker.latency_timings(self.clock.now())
    }

    /// A handle other threads can read the published timing through.
    #[must_use]
    pub fn reader(&self) -> FrameTimingReader {
        FrameTimingReader::new(self.published.clone(), self.clock.clone())
    }

    /// The latency tracker.
    #[must_use]
    pub const fn latency_tracker(&self) -> &LatencyTracker {
        &self.tracker
    }

    /// Turns hardware latency tracking on or off.
    pub fn set_latency_tracking_enabled(&mut self, enabled: bool) {
        self.tracker.set_enabled(enabled);
        self.refresh_inputs();
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &FrameTimeConfig {
        &self.config
    }

    /// Delays derived from the display.
    #[must_use]
    pub const fn static_delays(&self) -> &StaticDelays {
        &self.delays
    }

    /// Returns `true` if presentation is synchronised to vsync.
    #[must_use]
    pub const fn is_vsync(&self) -> bool {
        self.vsync
    }

    fn calc_frame_delta(&self) -> f64 {
        let nominal = self.delays.refresh_interval;
        if !self.vsync || !self.dynamic_prediction {
            return nominal;
        }
        if self.frame_deltas.count() < self.config.min_cadence_samples {
            return nominal;
        }
        let measured = self.frame_deltas.median_time_delta();
        if measured > nominal + self.config.cadence_clamp_margin {
            nominal
        } else {
            measured
        }
    }

    fn calc_screen_delay(&self) -> f64 {
        let switching = self.delays.screen_switching_delay;
        if !self.vsync {
            return switching + self.delays.no_vsync_to_scanout_delay;
        }
        let measured = self.tracker.median_scanout_delay();
        let usable = self.dynamic_prediction
            && self.tracker.sample_count() >= self.config.min_latency_samples
            && measured > self.config.min_plausible_scanout_delay
            && measured < self.config.max_plausible_scanout_delay;
        if usable {
            switching + measured
        } else {
            switching + self.delays.vsync_to_scanout_delay
        }
    }

    fn calc_timewarp_wait_delta(&self) -> f64 {
        if !(self.vsync && self.sdk_render && self.timewarp) {
            return 0.0;
        }
        if self.distortion_times.count() < self.config.distortion_samples_needed {
            return -self.config.default_timewarp_lead;
        }
        -(self.distortion_times.median_time_delta() + self.config.distortion_safety_margin)
    }

    fn calc_inputs(&self) -> TimingInputs {
        TimingInputs {
            frame_delta: self.calc_frame_delta(),
            screen_delay: self.calc_screen_delay(),
            timewarp_wait_delta: self.calc_timewarp_wait_delta(),
        }
    }

    /// Recomputes the inputs and republishes if they changed.
    fn refresh_inputs(&mut self) {
        if self.calc_inputs() != self.timing.inputs {
            self.rebuild_timing();
            self.publish();
        }
    }

    /// Rebuilds the current frame's timing from fresh inputs, keeping its
    /// begin time and index.
    fn rebuild_timing(&mut self) {
        let inputs = self.calc_inputs();
        let t = &self.timing;
        self.timing = if t.has_begun() {
            Timing::from_inputs(&inputs, &self.shutter, t.this_frame_time, t.frame_index)
        } else {
            Timing::pending(inputs, t.frame_index)
        };
    }

    fn published_timing(&self) -> PublishedTiming {
        PublishedTiming {
            timing: self.timing,
            shutter: self.shutter,
            vsync: self.vsync,
            free_running_delay: self.delays.free_running_delay(),
        }
    }

    fn publish(&self) {
        self.published.store(&self.published_timing().encode());
    }
}
