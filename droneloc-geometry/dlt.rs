//! Normalized Direct Linear Transform.
//!
//! Both point sets are moved to zero mean and average distance `sqrt(2)`
//! before the design matrix is built, then `A h = 0` is solved through SVD and
//! the result is de-normalized.

use nalgebra::{DMatrix, Matrix3};

use crate::error::{GeometryError, GeometryResult};
use crate::homography::{Homography, Pt2};

pub const MIN_CORRESPONDENCES: usize = 4;

/// Hartley normalization. `None` if all points coincide.
pub fn normalize_points(points: &[Pt2]) -> Option<(Vec<Pt2>, Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist <= f64::EPSILON {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points
        .iter()
        .map(|p| Pt2::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();
    Some((normalized, t))
}

/// Least-squares homography with `dst ~ H src`
pub fn dlt_homography(src: &[Pt2], dst: &[Pt2]) -> GeometryResult<Homography> {
    if src.len() != dst.len() {
        return Err(GeometryError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < MIN_CORRESPONDENCES {
        return Err(GeometryError::InsufficientCorrespondences {
            found: n,
            required: MIN_CORRESPONDENCES,
        });
    }

    let (src_n, t_src) = normalize_points(src).ok_or(GeometryError::Degenerate)?;
    let (dst_n, t_dst) = normalize_points(dst).ok_or(GeometryError::Degenerate)?;

    // Square up the 8x9 minimal system so the SVD yields a full V.
    let rows = (2 * n).max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (i, (p, q)) in src_n.iter().zip(&dst_n).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        let r0 = 2 * i;
        let r1 = r0 + 1;

        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(GeometryError::Degenerate)?;
    let smallest = svd.singular_values.imin();
    let h_vec = v_t.row(smallest);

    let h_norm = Matrix3::from_fn(|r, c| h_vec[3 * r + c]);
    let t_dst_inv = t_dst.try_inverse().ok_or(GeometryError::Degenerate)?;
    let h = Homography::from_matrix(t_dst_inv * h_norm * t_src).normalized();

    if !h.is_finite() {
        return Err(GeometryError::NonFinite);
    }
    Ok(h)
}
