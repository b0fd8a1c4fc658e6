// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Head pose types and the pose-prediction seam.
//!
//! How poses are sampled and filtered is outside this crate. The frame-time
//! manager only needs to ask "what will the head pose be at time `t`?",
//! which is what [`PosePredictor`] expresses.

use core::ops::Mul;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// A rotation quaternion `w + xi + yj + zk`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quat {
    /// `i` component.
    pub x: f64,
    /// `j` component.
    pub y: f64,
    /// `k` component.
    pub z: f64,
    /// Scalar component.
    pub w: f64,
}

impl Quat {
    /// No rotation.
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Creates a quaternion from its components.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `radians` about `axis` (normalised internally).
    #[must_use]
    pub fn from_axis_angle(axis: [f64; 3], radians: f64) -> Self {
        let len = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let half = radians * 0.5;
        let s = half.sin() / len;
        Self::new(axis[0] * s, axis[1] * s, axis[2] * s, half.cos())
    }

    /// Squared length.
    #[inline]
    #[must_use]
    pub fn norm_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Rescales to unit length; a zero quaternion becomes the identity.
    #[must_use]
    pub fn normalize(self) -> Self {
        let n = self.norm_squared().sqrt();
        if n == 0.0 {
            return Self::IDENTITY;
        }
        Self::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }

    /// Negates the vector part.
    #[inline]
    #[must_use]
    pub const fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Multiplicative inverse; the identity for a zero quaternion.
    #[must_use]
    pub fn inverse(self) -> Self {
        let n2 = self.norm_squared();
        if n2 == 0.0 {
            return Self::IDENTITY;
        }
        let c = self.conjugate();
        Self::new(c.x / n2, c.y / n2, c.z / n2, c.w / n2)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Quat {
    type Output = Self;

    /// Hamilton product: `self * rhs` applies `rhs` first.
    fn mul(self, rhs: Self) -> Self {
        let (a, b) = (self, rhs);
        Self::new(
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }
}

/// Head orientation and position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    /// Orientation relative to the tracking origin.
    pub orientation: Quat,
    /// Position in metres.
    pub position: [f64; 3],
}

/// A pose predicted for some time, along with when its sensor data was read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PredictedPose {
    /// The predicted pose.
    pub pose: Pose,
    /// When the sensor sample the prediction was extrapolated from was taken.
    pub sample_time: f64,
}

/// Predicts the head pose at an absolute time.
pub trait PosePredictor {
    /// Pose expected at `time` (seconds on the frame-time manager's clock).
    fn predict(&self, time: f64) -> PredictedPose;
}

impl<F> PosePredictor for F
where
    F: Fn(f64) -> PredictedPose,
{
    fn predict(&self, time: f64) -> PredictedPose {
        self(time)
    }
}
