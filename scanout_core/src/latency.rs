// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware latency tracking with colour-tagged frames.
//!
//! The renderer draws a small patch in one of [`FRAMES_TRACKED`] colours on
//! consecutive frames. An external tester watches that patch and reports the
//! colours it saw together with their scan-out times. [`LatencyTracker`]
//! pairs each report with the frames it tagged and turns the difference
//! between render end and scan-out into a median-filtered delay that the
//! frame-time manager feeds back into its prediction.
//!
//! # Cycle
//!
//! ```text
//!             all-zero report
//!  WaitingForZeroes ───────────▶ Matching ── issue 1..=7 (wrapping), save, match ──┐
//!        ▲                                                                         │
//!        └──── cycle complete / timeout / too many zero reports ◀──────────────────┘
//! ```
//!
//! While waiting, the renderer draws the untagged colour so that the tester
//! eventually reports nothing but zeroes. That guarantees no stale tag from a
//! previous cycle can be mistaken for a new one.

use crate::median::MedianCollector;
use crate::readback::{DrawColor, INCREMENT_COUNT, ReadbackRecordSet};
use crate::trace::{LatencySampleEvent, ModeChangeReason, Tracer, TrackerModeEvent};

/// Number of tags issued per cycle; every readback level except untagged.
pub const FRAMES_TRACKED: usize = INCREMENT_COUNT - 1;

/// Tuning for the [`LatencyTracker`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerConfig {
    /// Whether tracking starts enabled.
    pub enabled: bool,
    /// Minimum run of consecutive ring / readback colour agreements needed to
    /// accept a match.
    pub min_match_run: usize,
    /// Seconds without matching progress after which an exhausted cycle is
    /// abandoned.
    pub pending_timeout: f64,
    /// Consecutive all-zero reports tolerated while tags are pending.
    pub zero_report_limit: u32,
    /// Seconds after the last accepted sample at which reported latencies
    /// fall back to zero.
    pub report_stale_after: f64,
}

impl TrackerConfig {
    /// Default tracking: enabled, single-tag matches.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            min_match_run: 1,
            pending_timeout: 0.15,
            zero_report_limit: 14,
            report_stale_after: 2.0,
        }
    }

    /// Requires two consecutive agreeing tags before accepting a match.
    ///
    /// Rejects accidental single-colour matches at the cost of never matching
    /// a cycle with only one saved tag.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            min_match_run: 2,
            ..Self::new()
        }
    }

    /// Tracking switched off; every query reports zero.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Which half of the tag cycle the tracker is in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TrackerMode {
    /// No tags are issued until the tester reports an all-zero set.
    #[default]
    WaitingForZeroes,
    /// Tags are being issued and matched.
    Matching,
}

/// Progress of one tagged frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TagStatus {
    /// No frame has been saved for this slot in the current cycle.
    #[default]
    Empty,
    /// Saved and waiting for the tester to report it.
    Pending,
    /// Seen by the tester.
    Matched {
        /// When the tester first saw the tag.
        scanout_time: f64,
    },
}

/// One slot of the tag ring.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DrawTagRecord {
    /// Tag drawn into the frame.
    pub color: DrawColor,
    /// When rendering of the frame ended.
    pub end_frame_time: f64,
    /// When the frame's render pose was sampled; `0.0` if unknown.
    pub render_pose_time: f64,
    /// When the frame's time-warp pose was sampled; `0.0` if unknown.
    pub timewarp_pose_time: f64,
    /// Match state.
    pub status: TagStatus,
}

impl DrawTagRecord {
    const EMPTY: Self = Self {
        color: DrawColor::NONE,
        end_frame_time: 0.0,
        render_pose_time: 0.0,
        timewarp_pose_time: 0.0,
        status: TagStatus::Empty,
    };

    /// Returns `true` if the slot was saved and is not yet matched.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TagStatus::Pending
    }

    /// Returns `true` once the tester has reported this tag.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self.status, TagStatus::Matched { .. })
    }
}

/// Latencies reported to the application, in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatencyTimings {
    /// Scan-out time minus render pose-sample time.
    pub render: f32,
    /// Scan-out time minus time-warp pose-sample time.
    pub timewarp: f32,
    /// Median render-end to scan-out delay.
    pub scanout_median: f32,
}

impl LatencyTimings {
    /// Returns `[render, timewarp, scanout_median]`.
    #[must_use]
    pub const fn as_array(&self) -> [f32; 3] {
        [self.render, self.timewarp, self.scanout_median]
    }
}

/// Tag-and-match state machine for hardware latency measurement.
///
/// Owned by the render thread. Per frame the caller asks for a colour with
/// [`next_draw_color`](Self::next_draw_color), draws it, saves it with
/// [`save_draw_color`](Self::save_draw_color) once the frame has ended, and
/// hands every tester report to [`match_record`](Self::match_record).
///
/// Colours `1..=FRAMES_TRACKED` are issued in order and colour `n` always
/// lives in slot `n - 1`, so a slot can never hold two frames and a record
/// can never be counted twice. Once every colour has been issued the ring
/// wraps: the oldest colour is issued again and its record, whose frame is
/// a whole ring old, is discarded without a sample.
#[derive(Clone, Debug)]
pub struct LatencyTracker {
    config: TrackerConfig,
    enabled: bool,
    mode: TrackerMode,
    records: [DrawTagRecord; FRAMES_TRACKED],
    issued: u8,
    oldest: usize,
    progress_time: Option<f64>,
    match_count: u32,
    zero_reports: u32,
    scanout_delays: MedianCollector,
    render_latency: f64,
    timewarp_latency: f64,
    last_sample_time: Option<f64>,
}

impl LatencyTracker {
    /// Creates a tracker waiting for its first all-zero report.
    #[must_use]
    pub const fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            enabled: config.enabled,
            mode: TrackerMode::WaitingForZeroes,
            records: [DrawTagRecord::EMPTY; FRAMES_TRACKED],
            issued: 0,
            oldest: 0,
            progress_time: None,
            match_count: 0,
            zero_reports: 0,
            scanout_delays: MedianCollector::new(),
            render_latency: 0.0,
            timewarp_latency: 0.0,
            last_sample_time: None,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Returns `true` if tracking is on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns tracking on or off.
    ///
    /// Turning it off abandons the current cycle; turning it back on waits for
    /// zeroes again. Collected samples are kept.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.set_enabled_traced(enabled, &mut Tracer::none());
    }

    /// [`set_enabled`](Self::set_enabled) reporting mode changes to `tracer`.
    pub fn set_enabled_traced(&mut self, enabled: bool, tracer: &mut Tracer<'_>) {
        if self.enabled && !enabled {
            self.enter_waiting(ModeChangeReason::Disabled, tracer);
        }
        self.enabled = enabled;
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> TrackerMode {
        self.mode
    }

    /// Tags matched during the current cycle.
    #[must_use]
    pub const fn match_count(&self) -> u32 {
        self.match_count
    }

    /// Delay samples accepted since the last reset.
    #[must_use]
    pub const fn sample_count(&self) -> u64 {
        self.scanout_delays.count()
    }

    /// Median render-end to scan-out delay, or `0.0` without samples.
    #[must_use]
    pub fn median_scanout_delay(&self) -> f64 {
        self.scanout_delays.median_time_delta()
    }

    /// Returns the slots of the tag ring; slot `n - 1` holds colour `n`.
    #[must_use]
    pub const fn records(&self) -> &[DrawTagRecord; FRAMES_TRACKED] {
        &self.records
    }

    /// Issues the next tag colour for the frame about to be rendered.
    ///
    /// Returns [`DrawColor::NONE`] when tracking is off or while waiting for
    /// zeroes, and never while matching. After the first
    /// [`FRAMES_TRACKED`] colours the oldest slot is recycled: its record is
    /// dropped unmatched and its colour issued again.
    pub fn next_draw_color(&mut self) -> DrawColor {
        if !self.enabled || self.mode == TrackerMode::WaitingForZeroes {
            return DrawColor::NONE;
        }
        if usize::from(self.issued) < FRAMES_TRACKED {
            self.issued += 1;
            return DrawColor::from_index(self.issued).unwrap_or(DrawColor::NONE);
        }
        let slot = self.oldest;
        self.records[slot] = DrawTagRecord::EMPTY;
        self.oldest = (slot + 1) % FRAMES_TRACKED;
        u8::try_from(slot + 1)
            .ok()
            .and_then(DrawColor::from_index)
            .unwrap_or(DrawColor::NONE)
    }

    /// Records that the frame tagged with `color` finished rendering.
    ///
    /// Ignored when tracking is off, while waiting for zeroes, for a colour
    /// not issued in this cycle, or for a slot that is already filled.
    pub fn save_draw_color(
        &mut self,
        color: DrawColor,
        end_frame_time: f64,
        render_pose_time: f64,
        timewarp_pose_time: f64,
    ) {
        debug_assert!(!color.is_untagged(), "cannot save the untagged colour");
        if !self.enabled || self.mode == TrackerMode::WaitingForZeroes || color.is_untagged() {
            return;
        }
        if color.index() > self.issued {
            return;
        }
        let slot = &mut self.records[usize::from(color.index()) - 1];
        if slot.status != TagStatus::Empty {
            return;
        }
        *slot = DrawTagRecord {
            color,
            end_frame_time,
            render_pose_time,
            timewarp_pose_time,
            status: TagStatus::Pending,
        };
        if self.progress_time.is_none() {
            self.progress_time = Some(end_frame_time);
        }
    }

    /// Matches a tester report against the tag ring.
    pub fn match_record(&mut self, set: &ReadbackRecordSet) {
        self.match_record_traced(set, &mut Tracer::none());
    }

    /// [`match_record`](Self::match_record) reporting samples and mode changes
    /// to `tracer`.
    pub fn match_record_traced(&mut self, set: &ReadbackRecordSet, tracer: &mut Tracer<'_>) {
        if !self.enabled {
            return;
        }
        match self.mode {
            TrackerMode::WaitingForZeroes => {
                if set.is_all_zeroes() {
                    self.start_cycle(tracer);
                }
            }
            TrackerMode::Matching => {
                if set.is_all_zeroes() {
                    if self.records.iter().any(DrawTagRecord::is_pending) {
                        self.zero_reports += 1;
                        if self.zero_reports >= self.config.zero_report_limit {
                            self.enter_waiting(ModeChangeReason::ZeroReportLimit, tracer);
                        }
                    }
                    return;
                }
                self.zero_reports = 0;
                self.match_first_run(set, tracer);
                if self.cycle_complete() {
                    self.enter_waiting(ModeChangeReason::CycleComplete, tracer);
                }
            }
        }
    }

    /// Abandons an exhausted cycle whose tags were never reported.
    ///
    /// Fires once every colour has been issued and `end_frame_time` is more
    /// than [`pending_timeout`](TrackerConfig::pending_timeout) past the
    /// newest matched tag, or past the first saved tag if none matched
    /// (immediately if none was saved). Recycling the ring does not count as
    /// progress. Pending tags produce no samples; if nothing matched during
    /// the cycle the reported latencies are cleared.
    pub fn expire_stale(&mut self, end_frame_time: f64) {
        self.expire_stale_traced(end_frame_time, &mut Tracer::none());
    }

    /// [`expire_stale`](Self::expire_stale) reporting mode changes to `tracer`.
    pub fn expire_stale_traced(&mut self, end_frame_time: f64, tracer: &mut Tracer<'_>) {
        if !self.enabled
            || self.mode != TrackerMode::Matching
            || usize::from(self.issued) < FRAMES_TRACKED
        {
            return;
        }
        let expired = match self.progress_time {
            Some(t) => end_frame_time - t > self.config.pending_timeout,
            None => true,
        };
        if !expired {
            return;
        }
        if self.match_count == 0 {
            self.render_latency = 0.0;
            self.timewarp_latency = 0.0;
        }
        self.enter_waiting(ModeChangeReason::Expired, tracer);
    }

    /// Latencies to report at time `now`.
    ///
    /// All zero when tracking is off or when the last sample is older than
    /// [`report_stale_after`](TrackerConfig::report_stale_after).
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "latencies are reported in single precision"
    )]
    pub fn latency_timings(&self, now: f64) -> LatencyTimings {
        if !self.enabled {
            return LatencyTimings::default();
        }
        match self.last_sample_time {
            Some(t) if now - t <= self.config.report_stale_after => LatencyTimings {
                render: self.render_latency as f32,
                timewarp: self.timewarp_latency as f32,
                scanout_median: self.scanout_delays.median_time_delta() as f32,
            },
            _ => LatencyTimings::default(),
        }
    }

    /// Clears the ring, the filter, and all counters, and waits for zeroes.
    ///
    /// The enabled flag is kept.
    pub fn reset(&mut self) {
        let enabled = self.enabled;
        *self = Self::new(self.config);
        self.enabled = enabled;
    }

    fn start_cycle(&mut self, tracer: &mut Tracer<'_>) {
        self.clear_cycle();
        self.switch_mode(TrackerMode::Matching, ModeChangeReason::ZeroesSeen, tracer);
    }

    fn enter_waiting(&mut self, reason: ModeChangeReason, tracer: &mut Tracer<'_>) {
        self.clear_cycle();
        self.switch_mode(TrackerMode::WaitingForZeroes, reason, tracer);
    }

    fn clear_cycle(&mut self) {
        self.records = [DrawTagRecord::EMPTY; FRAMES_TRACKED];
        self.issued = 0;
        self.oldest = 0;
        self.progress_time = None;
        self.match_count = 0;
        self.zero_reports = 0;
    }

    fn switch_mode(&mut self, to: TrackerMode, reason: ModeChangeReason, tracer: &mut Tracer<'_>) {
        let from = self.mode;
        self.mode = to;
        if from != to {
            tracer.tracker_mode(&TrackerModeEvent { from, to, reason });
        }
    }

    /// Walks saved slots from oldest to newest issue and matches the first
    /// run of at least `min_match_run` colours that agrees with the report.
    fn match_first_run(&mut self, set: &ReadbackRecordSet, tracer: &mut Tracer<'_>) {
        let oldest = self.oldest;
        let slot_at = move |pos: usize| (oldest + pos) % FRAMES_TRACKED;
        for start in 0..FRAMES_TRACKED {
            let head = self.records[slot_at(start)];
            if head.status == TagStatus::Empty {
                continue;
            }
            let Some(first) = set.find_color(0, head.color) else {
                continue;
            };
            let run = (0..)
                .take_while(|&k| {
                    let report = first + k;
                    start + k < FRAMES_TRACKED
                        && report < ReadbackRecordSet::RECORD_COUNT
                        && self.records[slot_at(start + k)].status != TagStatus::Empty
                        && self.records[slot_at(start + k)].color == set.get(report).color
                })
                .count();
            if run < self.config.min_match_run.max(1) {
                continue;
            }
            let mut newly_matched = 0;
            for k in 0..run {
                let slot = slot_at(start + k);
                if self.records[slot].is_pending() {
                    let scanout_time = set.get(first + k).time;
                    self.accept(slot, scanout_time, tracer);
                    newly_matched += 1;
                }
            }
            if newly_matched > 0 {
                return;
            }
        }
    }

    fn accept(&mut self, slot: usize, scanout_time: f64, tracer: &mut Tracer<'_>) {
        let record = &mut self.records[slot];
        record.status = TagStatus::Matched { scanout_time };
        let record = *record;
        self.match_count += 1;
        self.progress_time = Some(
            self.progress_time
                .map_or(record.end_frame_time, |t| t.max(record.end_frame_time)),
        );

        let delay = scanout_time - record.end_frame_time;
        if delay <= 0.0 {
            return;
        }
        self.scanout_delays.add_time_delta(delay);
        self.render_latency = latency_since(scanout_time, record.render_pose_time);
        self.timewarp_latency = latency_since(scanout_time, record.timewarp_pose_time);
        self.last_sample_time = Some(scanout_time);
        tracer.latency_sample(&LatencySampleEvent {
            color: record.color,
            end_frame_time: record.end_frame_time,
            scanout_time,
            scanout_delay: delay,
            render_latency: self.render_latency,
            timewarp_latency: self.timewarp_latency,
        });
    }

    fn cycle_complete(&self) -> bool {
        usize::from(self.issued) >= FRAMES_TRACKED
            && !self.records.iter().any(DrawTagRecord::is_pending)
            && self.records.iter().any(DrawTagRecord::is_matched)
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::new())
    }
}

/// Scan-out time minus a pose-sample time; `0.0` if the pose time is unknown.
fn latency_since(scanout_time: f64, pose_time: f64) -> f64 {
    if pose_time > 0.0 {
        scanout_time - pose_time
    } else {
        0.0
    }
}
