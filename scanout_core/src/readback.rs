// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Latency-tester colour tags and pixel readback records.
//!
//! The latency tester watches a corner of the display and reports which
//! colour tag it saw and when. Tags are quantised into
//! [`INCREMENT_COUNT`] levels [`COLOR_INCREMENT`] apart, centred within each
//! level so that a tester reading within [`PIXEL_TEST_THRESHOLD`] of the
//! centre still decodes to the right tag.
//!
//! ```text
//!   index:   0    1    2    3    4    5    6    7
//!   pixel:  16   48   80  112  144  176  208  240
//! ```
//!
//! Index 0 is reserved for "untagged" ([`DrawColor::NONE`]).

/// Spacing between adjacent tag levels, in pixel intensity units.
pub const COLOR_INCREMENT: u8 = 32;

/// Number of distinct tag levels, including the untagged level.
pub const INCREMENT_COUNT: usize = 256 / COLOR_INCREMENT as usize;

/// Maximum distance from a level's centre that still decodes to that level.
pub const PIXEL_TEST_THRESHOLD: u8 = COLOR_INCREMENT / 3;

/// A colour tag, stored as its readback index (`0..INCREMENT_COUNT`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawColor(u8);

impl DrawColor {
    /// The untagged colour. Frames drawn with it are not tracked.
    pub const NONE: Self = Self(0);

    /// Creates a tag from a readback index.
    ///
    /// Returns `None` if `index >= INCREMENT_COUNT`.
    #[inline]
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        if (index as usize) < INCREMENT_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Returns the readback index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Returns `true` for [`DrawColor::NONE`].
    #[inline]
    #[must_use]
    pub const fn is_untagged(self) -> bool {
        self.0 == 0
    }

    /// Returns the pixel intensity the renderer should draw for this tag.
    #[inline]
    #[must_use]
    pub const fn to_pixel(self) -> u8 {
        self.0 * COLOR_INCREMENT + COLOR_INCREMENT / 2
    }

    /// Decodes a pixel intensity read back from the display.
    ///
    /// Returns `None` if the value falls between levels.
    #[must_use]
    pub const fn from_pixel(pixel: u8) -> Option<Self> {
        let index = pixel / COLOR_INCREMENT;
        let centre = index * COLOR_INCREMENT + COLOR_INCREMENT / 2;
        let delta = pixel.abs_diff(centre);
        if delta < PIXEL_TEST_THRESHOLD {
            Some(Self(index))
        } else {
            None
        }
    }
}

/// One observation from the latency tester.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReadbackRecord {
    /// Tag seen on screen.
    pub color: DrawColor,
    /// Absolute time (seconds) at which the tag was seen.
    pub time: f64,
}

/// The most recent [`RECORD_COUNT`](Self::RECORD_COUNT) tester observations.
///
/// Stored as a ring; [`get`](Self::get) indexes from oldest (`0`) to newest.
/// Readback lags rendering, so a single report usually covers several frames.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReadbackRecordSet {
    records: [ReadbackRecord; Self::RECORD_COUNT],
    next_write: usize,
}

impl ReadbackRecordSet {
    /// Number of records carried per report.
    pub const RECORD_COUNT: usize = 4;

    /// Creates an all-zero set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: [ReadbackRecord {
                color: DrawColor::NONE,
                time: 0.0,
            }; Self::RECORD_COUNT],
            next_write: 0,
        }
    }

    /// Builds a set from records ordered oldest to newest.
    ///
    /// Missing leading entries are left untagged.
    #[must_use]
    pub fn from_records(records: &[ReadbackRecord]) -> Self {
        let mut set = Self::new();
        let skip = records.len().saturating_sub(Self::RECORD_COUNT);
        for r in &records[skip..] {
            set.push(r.color, r.time);
        }
        set
    }

    /// Appends an observation, evicting the oldest.
    pub fn push(&mut self, color: DrawColor, time: f64) {
        self.records[self.next_write] = ReadbackRecord { color, time };
        self.next_write = (self.next_write + 1) % Self::RECORD_COUNT;
    }

    /// Returns the `i`-th record counting from the oldest.
    ///
    /// # Panics
    ///
    /// Panics if `i >= RECORD_COUNT`.
    #[must_use]
    pub fn get(&self, i: usize) -> ReadbackRecord {
        assert!(i < Self::RECORD_COUNT, "readback record index out of range");
        self.records[(self.next_write + i) % Self::RECORD_COUNT]
    }

    /// Returns the newest record.
    #[must_use]
    pub fn most_recent(&self) -> ReadbackRecord {
        self.get(Self::RECORD_COUNT - 1)
    }

    /// Finds the first record at or after `start` (oldest-relative) carrying
    /// `color`.
    #[must_use]
    pub fn find_color(&self, start: usize, color: DrawColor) -> Option<usize> {
        (start..Self::RECORD_COUNT).find(|&i| self.get(i).color == color)
    }

    /// Returns `true` if no record carries a tag.
    #[must_use]
    pub fn is_all_zeroes(&self) -> bool {
        self.records.iter().all(|r| r.color.is_untagged())
    }

    /// Iterates the records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = ReadbackRecord> + '_ {
        (0..Self::RECORD_COUNT).map(|i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(i: u8) -> DrawColor {
        DrawColor::from_index(i).unwrap()
    }

    #[test]
    fn pixel_encoding_is_centred() {
        assert_eq!(DrawColor::NONE.to_pixel(), 16);
        assert_eq!(color(1).to_pixel(), 48);
        assert_eq!(color(7).to_pixel(), 240);
    }

    #[test]
    fn pixel_decoding_tolerates_noise() {
        assert_eq!(DrawColor::from_pixel(48), Some(color(1)));
        assert_eq!(DrawColor::from_pixel(48 + 9), Some(color(1)));
        assert_eq!(DrawColor::from_pixel(48 - 9), Some(color(1)));
        // Right between two levels.
        assert_eq!(DrawColor::from_pixel(64), None);
        assert_eq!(DrawColor::from_pixel(255), None);
    }

    #[test]
    fn every_level_round_trips() {
        for i in 0..=7_u8 {
            let c = color(i);
            assert_eq!(DrawColor::from_pixel(c.to_pixel()), Some(c));
        }
    }

    #[test]
    fn from_index_rejects_out_of_range() {
        assert!(DrawColor::from_index(8).is_none());
        assert!(DrawColor::NONE.is_untagged());
        assert!(!color(3).is_untagged());
    }

    #[test]
    fn set_orders_oldest_to_newest() {
        let mut set = ReadbackRecordSet::new();
        for i in 1..=6 {
            set.push(color(i), f64::from(i));
        }
        let seen: [u8; 4] = core::array::from_fn(|i| set.get(i).color.index());
        assert_eq!(seen, [3, 4, 5, 6]);
        assert_eq!(set.most_recent().color, color(6));
    }

    #[test]
    fn find_color_respects_start() {
        let set = ReadbackRecordSet::from_records(&[
            ReadbackRecord { color: color(2), time: 1.0 },
            ReadbackRecord { color: color(3), time: 2.0 },
            ReadbackRecord { color: color(2), time: 3.0 },
        ]);
        // One leading untagged slot, then 2, 3, 2.
        assert_eq!(set.find_color(0, color(2)), Some(1));
        assert_eq!(set.find_color(2, color(2)), Some(3));
        assert_eq!(set.find_color(0, color(5)), None);
    }

    #[test]
    fn all_zeroes() {
        let mut set = ReadbackRecordSet::new();
        assert!(set.is_all_zeroes());
        set.push(color(1), 0.5);
        assert!(!set.is_all_zeroes());
    }
}
