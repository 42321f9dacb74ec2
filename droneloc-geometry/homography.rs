use nalgebra::{Matrix3, Point2, Vector3};

use crate::error::{GeometryError, GeometryResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type Pt2 = Point2<f64>;

/// Homogeneous weights smaller than this are treated as points at infinity
pub const MIN_WEIGHT: f64 = 1e-12;

/// Planar projective transform `x' ~ H x`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]"))]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self(matrix)
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let m = &self.0;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Scale so that `H[2,2] == 1` when that entry is not vanishing
    pub fn normalized(&self) -> Self {
        let scale = self.0[(2, 2)];
        if scale.abs() > f64::EPSILON {
            Self(self.0 / scale)
        } else {
            *self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Map a point, or `None` when it lands at infinity
    pub fn project(&self, p: &Pt2) -> Option<Pt2> {
        let q = self.0 * Vector3::new(p.x, p.y, 1.0);
        if q.z.abs() < MIN_WEIGHT {
            return None;
        }
        Some(Pt2::new(q.x / q.z, q.y / q.z))
    }

    /// Forward reprojection error of one correspondence
    pub fn transfer_error(&self, src: &Pt2, dst: &Pt2) -> f64 {
        self.project(src)
            .map_or(f64::INFINITY, |p| nalgebra::distance(&p, dst))
    }

    /// Image of the center `(width / 2, height / 2)` of a `width` x `height` image
    pub fn project_center(&self, width: usize, height: usize) -> GeometryResult<Pt2> {
        let center = Pt2::new(width as f64 / 2.0, height as f64 / 2.0);
        self.project(&center).ok_or(GeometryError::PointAtInfinity {
            x: center.x,
            y: center.y,
        })
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[[f64; 3]; 3]> for Homography {
    fn from(rows: [[f64; 3]; 3]) -> Self {
        Self::from_rows(rows)
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.to_rows()
    }
}

/// Project the center of a `width` x `height` image through `h`
pub fn project_center(h: &Homography, width: usize, height: usize) -> GeometryResult<Pt2> {
    h.project_center(width, height)
}
