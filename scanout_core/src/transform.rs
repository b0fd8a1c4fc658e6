// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal column-major 4×4 transform for time-warp.
//!
//! Covers what the time-warp matrices need (rotation from a quaternion, the
//! change into the distortion mesh's basis, composition) without pulling in a
//! full linear-algebra crate.

use core::ops::Mul;

use crate::pose::Quat;

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, the layout GPU APIs
/// expect for uniform upload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self::from_scale(1.0, 1.0, 1.0);

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Rotation matrix of a unit quaternion.
    #[must_use]
    pub fn from_quat(q: Quat) -> Self {
        let Quat { x, y, z, w } = q;
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);
        Self {
            cols: [
                [1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy), 0.0],
                [2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx), 0.0],
                [2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy), 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Re-expresses a rotation in normalised device coordinates, where Y and
    /// Z point the other way.
    ///
    /// Equivalent to `S * self * S` with `S = diag(1, -1, -1, 1)`: only the
    /// entries coupling X with Y or Z change sign.
    #[must_use]
    pub const fn to_ndc_basis(self) -> Self {
        let mut cols = self.cols;
        cols[0][1] = -cols[0][1];
        cols[0][2] = -cols[0][2];
        cols[1][0] = -cols[1][0];
        cols[2][0] = -cols[2][0];
        Self { cols }
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let cols = core::array::from_fn(|j| {
            core::array::from_fn(|i| (0..4).map(|k| a[k][i] * b[j][k]).sum())
        });
        Self { cols }
    }
}
