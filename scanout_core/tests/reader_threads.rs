// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Readers on other threads never observe a half-published frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use scanout_core::clock::ManualClock;
use scanout_core::display::{DisplayInfo, ShutterInfo, ShutterType};
use scanout_core::manager::{FrameTimeConfig, FrameTimeManager};
use scanout_core::snapshot::FrameTimingReader;
use scanout_core::timing::{Eye, Timing};

const WRITER_FRAMES: u64 = 20_000;
const READERS: usize = 3;

fn rolling_display() -> DisplayInfo {
    DisplayInfo::new(ShutterInfo {
        shutter_type: ShutterType::RollingLeftToRight,
        vsync_to_next_vsync: 1.0 / 90.0,
        vsync_to_first_scanline: 0.000_1,
        first_scanline_to_last_scanline: 0.010,
        pixel_settle_time: 0.001,
        pixel_persistence: 0.002,
    })
}

/// Checks the relations every published frame satisfies.
fn assert_coherent(t: &Timing) {
    let delta = t.inputs.frame_delta;
    assert!(
        (t.next_frame_time - t.this_frame_time - delta).abs() < 1e-9,
        "torn frame times: {t:?}"
    );
    let base = t.next_frame_time + t.inputs.screen_delay;
    assert!(
        (t.midpoint_time - (base + delta * 0.5)).abs() < 1e-9,
        "torn midpoint: {t:?}"
    );
    assert!(
        (t.eye_render_time(Eye::Left) - (base + delta * 0.25)).abs() < 1e-9,
        "torn eye time: {t:?}"
    );
    assert!(
        t.eye_render_time(Eye::Right) >= t.eye_render_time(Eye::Left),
        "eyes out of scan order: {t:?}"
    );
}

fn read_until_stopped(reader: &FrameTimingReader, stop: &AtomicBool) -> u64 {
    let mut last_index = 0;
    let mut last_version = 0;
    let mut reads = 0;
    while !stop.load(Ordering::Acquire) {
        let version = reader.version();
        assert!(version >= last_version, "publication count went backwards");
        last_version = version;

        let t = reader.timing();
        if t.has_begun() {
            assert_coherent(&t);
            assert!(
                t.frame_index >= last_index,
                "frame index went backwards: {} after {last_index}",
                t.frame_index
            );
            last_index = t.frame_index;
        }
        reads += 1;
    }
    reads
}

#[test]
fn concurrent_readers_see_whole_frames() {
    let clock = Arc::new(ManualClock::new(1.0));
    let mut manager = FrameTimeManager::new(FrameTimeConfig::new(), clock.clone());
    manager.init(rolling_display()).unwrap();
    let reader = manager.reader();
    let stop = AtomicBool::new(false);

    let total_reads: u64 = thread::scope(|s| {
        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                let reader = reader.clone();
                let stop = &stop;
                s.spawn(move || read_until_stopped(&reader, stop))
            })
            .collect();

        for i in 0..WRITER_FRAMES {
            // Jitter the cadence so frame_delta keeps changing.
            let jitter = if i % 3 == 0 { 0.000_4 } else { -0.000_2 };
            clock.advance(1.0 / 90.0 + jitter);
            manager.begin_frame(i);
        }
        stop.store(true, Ordering::Release);

        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert!(total_reads > 0, "readers never ran");
    let last = reader.timing();
    assert_eq!(last.frame_index, WRITER_FRAMES - 1);
    assert_coherent(&last);
}

#[test]
fn reader_tracks_manager_between_frames() {
    let clock = Arc::new(ManualClock::new(1.0));
    let mut manager = FrameTimeManager::new(FrameTimeConfig::new(), clock.clone());
    manager.init(rolling_display()).unwrap();
    let reader = manager.reader();

    let before = reader.version();
    clock.advance(0.01);
    manager.begin_frame(0);
    assert!(reader.version() > before, "begin_frame did not publish");
    assert_eq!(reader.timing(), *manager.timing());

    let handle = thread::spawn(move || reader.frame_timing(2));
    let ahead = handle.join().unwrap();
    let t = manager.timing();
    let expected_start = t.next_frame_time + t.inputs.frame_delta;
    assert!((ahead.this_frame_time - expected_start).abs() < 1e-12);
}
