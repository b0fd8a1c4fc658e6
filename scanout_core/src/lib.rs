// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scan-out timing prediction and hardware latency tracking for head-mounted
//! displays.
//!
//! `scanout_core` predicts, for every frame, the absolute times at which its
//! pixels reach the viewer's eyes, and refines those predictions from what it
//! measures: the frame cadence, how long distortion rendering takes, and the
//! scan-out delay reported by an external latency tester. It is `no_std`
//! compatible (with `alloc`), never blocks, and never allocates per frame.
//!
//! # Architecture
//!
//! ```text
//!   Clock ──► FrameTimeManager::begin_frame() ──► Timing ──► SnapshotCell
//!                  ▲            ▲                                 │
//!      cadence     │            │ scan-out delay                  ▼
//!   MedianCollector      LatencyTracker ◄── ReadbackRecordSet   FrameTimingReader
//!                                                              (other threads)
//! ```
//!
//! **[`median`]**: Fixed-window median filter for timing samples.
//!
//! **[`readback`]**: Colour tags and the latency tester's readback records.
//!
//! **[`latency`]**: Tag-and-match state machine that measures render-end to
//! scan-out delay.
//!
//! **[`display`]**: Static display descriptor and its validation.
//!
//! **[`timing`]**: Per-frame predicted times and the shutter-dependent
//! computation that produces them.
//!
//! **[`manager`]**: [`FrameTimeManager`](manager::FrameTimeManager), which
//! owns the filters and the tracker and publishes each frame's timing.
//!
//! **[`snapshot`]**: Lock-free sequence lock and the thread-safe
//! [`FrameTimingReader`](snapshot::FrameTimingReader).
//!
//! **[`pose`]** / **[`transform`]**: Pose-prediction seam and the time-warp
//! rotation matrices built from it.
//!
//! **[`clock`]**: [`Clock`](clock::Clock) trait with manual and system
//! implementations.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types, with
//! zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies and
//!   provides `SystemClock`.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod clock;
pub mod display;
pub mod latency;
pub mod manager;
pub mod median;
pub mod pose;
pub mod readback;
pub mod snapshot;
pub mod timing;
pub mod trace;
pub mod transform;
