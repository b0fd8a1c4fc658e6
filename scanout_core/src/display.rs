// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static display characteristics consumed once at initialisation.
//!
//! A [`DisplayInfo`] describes the panel's refresh interval and shutter
//! behaviour. The frame-time manager turns it into a [`ShutterGeometry`]
//! (what the per-frame prediction needs) and a set of
//! [`StaticDelays`](crate::manager::StaticDelays).

use core::fmt;

/// How the panel lights up its pixels within one refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShutterType {
    /// All pixels switch at once.
    #[default]
    Global,
    /// Scan-out sweeps from the top edge to the bottom edge; both eyes are
    /// lit at the same time.
    RollingTopToBottom,
    /// Scan-out sweeps from the left edge to the right edge, so the left eye
    /// is lit before the right.
    RollingLeftToRight,
    /// Scan-out sweeps from the right edge to the left edge, so the right eye
    /// is lit before the left.
    RollingRightToLeft,
}

impl ShutterType {
    /// Returns `true` if the two eyes are scanned one after the other.
    #[must_use]
    pub const fn scans_eyes_sequentially(self) -> bool {
        matches!(self, Self::RollingLeftToRight | Self::RollingRightToLeft)
    }

    pub(crate) const fn to_word(self) -> u64 {
        match self {
            Self::Global => 0,
            Self::RollingTopToBottom => 1,
            Self::RollingLeftToRight => 2,
            Self::RollingRightToLeft => 3,
        }
    }

    pub(crate) const fn from_word(word: u64) -> Self {
        match word {
            1 => Self::RollingTopToBottom,
            2 => Self::RollingLeftToRight,
            3 => Self::RollingRightToLeft,
            _ => Self::Global,
        }
    }
}

/// Shutter timing of the panel. All durations are in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShutterInfo {
    /// Scan direction / global shutter.
    pub shutter_type: ShutterType,
    /// Nominal refresh interval.
    pub vsync_to_next_vsync: f64,
    /// Delay from vsync until the first scanline is driven.
    ///
    /// Validated but informational: the static vsync-to-scan-out delays in
    /// [`FrameTimeConfig`](crate::manager::FrameTimeConfig) already include
    /// it.
    pub vsync_to_first_scanline: f64,
    /// Time to sweep from the first to the last scanline.
    pub first_scanline_to_last_scanline: f64,
    /// Time a pixel takes to settle on its new value.
    pub pixel_settle_time: f64,
    /// How long a pixel stays lit once switched.
    pub pixel_persistence: f64,
}

impl Default for ShutterInfo {
    /// A 60 Hz global-shutter panel with full persistence.
    fn default() -> Self {
        Self {
            shutter_type: ShutterType::Global,
            vsync_to_next_vsync: 1.0 / 60.0,
            vsync_to_first_scanline: 0.0,
            first_scanline_to_last_scanline: 0.0,
            pixel_settle_time: 0.0,
            pixel_persistence: 1.0 / 60.0,
        }
    }
}

impl ShutterInfo {
    /// Delay between the first-scanned eye and the second-scanned eye.
    ///
    /// Half of the scan sweep for left/right rolling shutters, zero otherwise.
    #[must_use]
    pub fn eye_scan_offset(&self) -> f64 {
        if self.shutter_type.scans_eyes_sequentially() {
            self.first_scanline_to_last_scanline * 0.5
        } else {
            0.0
        }
    }

    /// Average time between a pixel being driven and it being perceived.
    #[must_use]
    pub fn switching_delay(&self) -> f64 {
        self.pixel_settle_time * 0.5 + self.pixel_persistence * 0.5
    }
}

/// Static description of the head-mounted display.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayInfo {
    /// Shutter timing.
    pub shutter: ShutterInfo,
}

impl DisplayInfo {
    /// Describes a display with the given shutter.
    #[must_use]
    pub const fn new(shutter: ShutterInfo) -> Self {
        Self { shutter }
    }

    /// Checks that every timing parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayInfoError::InvalidRefreshInterval`] if the refresh
    /// interval is not positive and finite, and
    /// [`DisplayInfoError::InvalidShutterTiming`] if any other duration is
    /// negative or non-finite.
    pub fn validate(&self) -> Result<(), DisplayInfoError> {
        let s = &self.shutter;
        if !(s.vsync_to_next_vsync.is_finite() && s.vsync_to_next_vsync > 0.0) {
            return Err(DisplayInfoError::InvalidRefreshInterval);
        }
        let durations = [
            ("vsync_to_first_scanline", s.vsync_to_first_scanline),
            (
                "first_scanline_to_last_scanline",
                s.first_scanline_to_last_scanline,
            ),
            ("pixel_settle_time", s.pixel_settle_time),
            ("pixel_persistence", s.pixel_persistence),
        ];
        for (field, value) in durations {
            if !(value.is_finite() && value >= 0.0) {
                return Err(DisplayInfoError::InvalidShutterTiming { field });
            }
        }
        Ok(())
    }

    /// The part of the descriptor that per-frame prediction depends on.
    #[must_use]
    pub fn geometry(&self) -> ShutterGeometry {
        ShutterGeometry {
            shutter_type: self.shutter.shutter_type,
            eye_scan_offset: self.shutter.eye_scan_offset(),
        }
    }
}

/// Shutter type plus the per-eye scan offset derived from it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShutterGeometry {
    /// Scan direction / global shutter.
    pub shutter_type: ShutterType,
    /// Seconds between the first- and second-scanned eye.
    pub eye_scan_offset: f64,
}

/// Errors from [`FrameTimeManager::init`](crate::manager::FrameTimeManager::init).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayInfoError {
    /// The refresh interval is zero, negative, or not finite.
    InvalidRefreshInterval,
    /// A shutter duration is negative or not finite.
    InvalidShutterTiming {
        /// Name of the offending [`ShutterInfo`] field.
        field: &'static str,
    },
    /// The manager was already initialised with different parameters.
    AlreadyInitialized,
}

impl fmt::Display for DisplayInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRefreshInterval => {
                write!(f, "display refresh interval must be positive and finite")
            }
            Self::InvalidShutterTiming { field } => {
                write!(f, "shutter timing `{field}` must be non-negative and finite")
            }
            Self::AlreadyInitialized => write!(
                f,
                "frame timing already initialised with a different display"
            ),
        }
    }
}

impl core::error::Error for DisplayInfoError {}
