//! Levenberg-Marquardt refinement of the nine homography entries against the
//! forward reprojection residuals.

use nalgebra::{Cholesky, SMatrix, SVector};

use crate::error::{GeometryError, GeometryResult};
use crate::homography::{Homography, Pt2, MIN_WEIGHT};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

type Params = SVector<f64, 9>;
type Normal = SMatrix<f64, 9, 9>;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RefineConfig {
    pub max_iterations: usize,
    pub initial_lambda: f64,
    pub lambda_scale_up: f64,
    pub lambda_scale_down: f64,
    /// Step norm below which an accepted step ends the solve
    pub tolerance: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            initial_lambda: 1e-4,
            lambda_scale_up: 10.0,
            lambda_scale_down: 0.1,
            tolerance: 1e-10,
        }
    }
}

impl RefineConfig {
    pub fn validate(&self) -> GeometryResult<()> {
        if !(self.initial_lambda.is_finite() && self.initial_lambda > 0.0) {
            return Err(GeometryError::InvalidParams(format!(
                "initial_lambda must be positive, got {}",
                self.initial_lambda
            )));
        }
        if !(self.lambda_scale_up.is_finite() && self.lambda_scale_up > 1.0) {
            return Err(GeometryError::InvalidParams(format!(
                "lambda_scale_up must exceed 1, got {}",
                self.lambda_scale_up
            )));
        }
        if !(self.lambda_scale_down > 0.0 && self.lambda_scale_down < 1.0) {
            return Err(GeometryError::InvalidParams(format!(
                "lambda_scale_down must lie in (0, 1), got {}",
                self.lambda_scale_down
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(GeometryError::InvalidParams(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineSummary {
    pub iterations: usize,
    /// Root-mean-square reprojection error before refinement
    pub initial_rms: f64,
    pub final_rms: f64,
}

/// Sum of squared residuals, or infinity if any point leaves the plane
fn cost(h: &Params, src: &[Pt2], dst: &[Pt2]) -> f64 {
    let mut total = 0.0;
    for (p, q) in src.iter().zip(dst) {
        let w = h[6] * p.x + h[7] * p.y + h[8];
        if w.abs() < MIN_WEIGHT {
            return f64::INFINITY;
        }
        let u = (h[0] * p.x + h[1] * p.y + h[2]) / w - q.x;
        let v = (h[3] * p.x + h[4] * p.y + h[5]) / w - q.y;
        total += u * u + v * v;
    }
    total
}

/// Accumulate `J^T J` and `J^T r` one correspondence at a time
fn normal_equations(h: &Params, src: &[Pt2], dst: &[Pt2]) -> Option<(Normal, Params)> {
    let mut jtj = Normal::zeros();
    let mut jtr = Params::zeros();

    for (p, q) in src.iter().zip(dst) {
        let w = h[6] * p.x + h[7] * p.y + h[8];
        if w.abs() < MIN_WEIGHT {
            return None;
        }
        let inv_w = 1.0 / w;
        let px = (h[0] * p.x + h[1] * p.y + h[2]) * inv_w;
        let py = (h[3] * p.x + h[4] * p.y + h[5]) * inv_w;

        let (x, y) = (p.x * inv_w, p.y * inv_w);
        let ju = Params::from_column_slice(&[x, y, inv_w, 0.0, 0.0, 0.0, -px * x, -px * y, -px * inv_w]);
        let jv = Params::from_column_slice(&[0.0, 0.0, 0.0, x, y, inv_w, -py * x, -py * y, -py * inv_w]);

        let (ru, rv) = (px - q.x, py - q.y);
        jtj += ju * ju.transpose() + jv * jv.transpose();
        jtr += ju * ru + jv * rv;
    }
    Some((jtj, jtr))
}

/// Minimize the forward reprojection error of `h` over all given pairs
pub fn refine_homography(
    h: &Homography,
    src: &[Pt2],
    dst: &[Pt2],
    config: &RefineConfig,
) -> GeometryResult<(Homography, RefineSummary)> {
    config.validate()?;
    if src.len() != dst.len() {
        return Err(GeometryError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }

    let n = src.len().max(1) as f64;
    let mut params = Params::from_iterator(h.to_rows().into_iter().flatten());
    let mut current = cost(&params, src, dst);
    let initial_rms = (current / n).sqrt();
    let mut lambda = config.initial_lambda;
    let mut iterations = 0;

    while iterations < config.max_iterations && current.is_finite() {
        iterations += 1;
        let Some((mut jtj, jtr)) = normal_equations(&params, src, dst) else {
            break;
        };
        let gradient_norm = jtr.norm();

        for i in 0..9 {
            jtj[(i, i)] += lambda * jtj[(i, i)].max(1.0);
        }
        let Some(chol) = Cholesky::new(jtj) else {
            lambda *= config.lambda_scale_up;
            continue;
        };
        let step = chol.solve(&jtr);
        let candidate = params - step;
        let candidate_cost = cost(&candidate, src, dst);

        if candidate_cost < current {
            params = candidate;
            current = candidate_cost;
            lambda *= config.lambda_scale_down;
            if step.norm() < config.tolerance {
                break;
            }
        } else {
            lambda *= config.lambda_scale_up;
            if gradient_norm < 1e-6 || !lambda.is_finite() || lambda > 1e12 {
                break;
            }
        }
    }

    let refined = Homography::from_matrix(SMatrix::<f64, 3, 3>::from_row_slice(params.as_slice())).normalized();
    if !refined.is_finite() {
        return Err(GeometryError::NonFinite);
    }

    Ok((
        refined,
        RefineSummary {
            iterations,
            initial_rms,
            final_rms: (current / n).sqrt(),
        },
    ))
}
