//! RANSAC over minimal four-point DLT samples.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::dlt::{dlt_homography, MIN_CORRESPONDENCES};
use crate::error::{GeometryError, GeometryResult};
use crate::homography::{Homography, Pt2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEED: u64 = 0x0d20_6e10;

/// Relative cross-product below which three points count as collinear
const COLLINEAR_EPS: f64 = 1e-6;

/// Where the sampling RNG gets its seed.
///
/// Serialized as the bare integer for `Fixed` and as the string `"os"`
/// otherwise, so both modes survive formats without a null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "SeedRepr", into = "SeedRepr"))]
pub enum SeedMode {
    /// Reproducible runs
    Fixed(u64),
    /// Fresh entropy on every call
    Os,
}

impl Default for SeedMode {
    fn default() -> Self {
        SeedMode::Fixed(DEFAULT_SEED)
    }
}

impl SeedMode {
    fn rng(self) -> ChaCha8Rng {
        match self {
            SeedMode::Fixed(seed) => ChaCha8Rng::seed_from_u64(seed),
            SeedMode::Os => ChaCha8Rng::from_os_rng(),
        }
    }
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SeedRepr {
    Fixed(u64),
    Named(String),
}

#[cfg(feature = "serde")]
impl TryFrom<SeedRepr> for SeedMode {
    type Error = String;

    fn try_from(value: SeedRepr) -> Result<Self, Self::Error> {
        match value {
            SeedRepr::Fixed(seed) => Ok(SeedMode::Fixed(seed)),
            SeedRepr::Named(name) if name.eq_ignore_ascii_case("os") => Ok(SeedMode::Os),
            SeedRepr::Named(name) => Err(format!("seed must be an integer or \"os\", got {name:?}")),
        }
    }
}

#[cfg(feature = "serde")]
impl From<SeedMode> for SeedRepr {
    fn from(value: SeedMode) -> Self {
        match value {
            SeedMode::Fixed(seed) => SeedRepr::Fixed(seed),
            SeedMode::Os => SeedRepr::Named("os".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacConfig {
    /// Inlier threshold on forward reprojection error, in pixels
    pub threshold: f64,
    pub max_iterations: usize,
    /// Target probability of having drawn one all-inlier sample
    pub confidence: f64,
    pub seed: SeedMode,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            max_iterations: 2000,
            confidence: 0.995,
            seed: SeedMode::default(),
        }
    }
}

impl RansacConfig {
    pub fn validate(&self) -> GeometryResult<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(GeometryError::InvalidParams(format!(
                "threshold must be positive, got {}",
                self.threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(GeometryError::InvalidParams("max_iterations must be at least 1".into()));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(GeometryError::InvalidParams(format!(
                "confidence must lie in (0, 1), got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RansacOutcome {
    pub homography: Homography,
    /// Indices of correspondences within the threshold, ascending
    pub inliers: Vec<usize>,
    pub iterations: usize,
}

pub fn ransac_homography(src: &[Pt2], dst: &[Pt2], config: &RansacConfig) -> GeometryResult<RansacOutcome> {
    config.validate()?;
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

    let mut rng = config.seed.rng();

    let mut best: Option<(Homography, Vec<usize>)> = None;
    let mut sample = Vec::with_capacity(MIN_CORRESPONDENCES);
    let mut sample_src = Vec::with_capacity(MIN_CORRESPONDENCES);
    let mut sample_dst = Vec::with_capacity(MIN_CORRESPONDENCES);
    let mut max_iter = config.max_iterations;
    let mut iterations = 0;

    while iterations < max_iter {
        iterations += 1;
        random_sample_into(&mut rng, n, MIN_CORRESPONDENCES, &mut sample);

        sample_src.clear();
        sample_dst.clear();
        sample_src.extend(sample.iter().map(|&i| src[i]));
        sample_dst.extend(sample.iter().map(|&i| dst[i]));
        if has_collinear_triple(&sample_src) || has_collinear_triple(&sample_dst) {
            continue;
        }

        let Ok(model) = dlt_homography(&sample_src, &sample_dst) else {
            continue;
        };
        let inliers = find_inliers(&model, src, dst, config.threshold);
        let best_count = best.as_ref().map_or(0, |(_, b)| b.len());
        if inliers.len() > best_count {
            let ratio = inliers.len() as f64 / n as f64;
            max_iter = max_iter.min(adaptive_iterations(ratio, MIN_CORRESPONDENCES, config.confidence));
            best = Some((model, inliers));
        }
    }

    let Some((model, inliers)) = best else {
        return Err(GeometryError::NoConsensus { iterations });
    };

    // Refit on the consensus set, keeping the sample model if that loses support.
    let (homography, inliers) = match refit(&inliers, src, dst, config.threshold) {
        Some((refined, refined_inliers)) if refined_inliers.len() >= inliers.len() => (refined, refined_inliers),
        _ => (model, inliers),
    };

    Ok(RansacOutcome {
        homography,
        inliers,
        iterations,
    })
}

fn refit(inliers: &[usize], src: &[Pt2], dst: &[Pt2], threshold: f64) -> Option<(Homography, Vec<usize>)> {
    if inliers.len() < MIN_CORRESPONDENCES {
        return None;
    }
    let in_src: Vec<Pt2> = inliers.iter().map(|&i| src[i]).collect();
    let in_dst: Vec<Pt2> = inliers.iter().map(|&i| dst[i]).collect();
    let refined = dlt_homography(&in_src, &in_dst).ok()?;
    let refined_inliers = find_inliers(&refined, src, dst, threshold);
    Some((refined, refined_inliers))
}

pub fn find_inliers(h: &Homography, src: &[Pt2], dst: &[Pt2], threshold: f64) -> Vec<usize> {
    src.iter()
        .zip(dst)
        .enumerate()
        .filter(|(_, (s, d))| h.transfer_error(s, d) <= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Whether any three of the points are (nearly) collinear or coincide
pub fn has_collinear_triple(points: &[Pt2]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                let a = points[j] - points[i];
                let b = points[k] - points[i];
                let cross = a.x * b.y - a.y * b.x;
                if cross.abs() <= COLLINEAR_EPS * a.norm() * b.norm() {
                    return true;
                }
            }
        }
    }
    false
}

/// Iterations needed to draw one all-inlier sample with the given confidence
pub fn adaptive_iterations(inlier_ratio: f64, sample_size: usize, confidence: f64) -> usize {
    if inlier_ratio >= 1.0 {
        return 1;
    }
    if inlier_ratio <= 0.0 {
        return usize::MAX;
    }

    let w_n = inlier_ratio.powi(sample_size as i32);
    let log_outlier = (1.0 - w_n).ln();
    if log_outlier >= 0.0 {
        return usize::MAX;
    }
    let log_conf = (1.0 - confidence).ln();
    (log_conf / log_outlier).ceil().max(1.0) as usize
}

/// Draw `k` distinct indices from `0..n` into `buffer`
fn random_sample_into<R: Rng>(rng: &mut R, n: usize, k: usize, buffer: &mut Vec<usize>) {
    debug_assert!(k <= n, "cannot sample {k} indices from {n}");
    buffer.clear();
    if k <= n / 2 {
        // Floyd's algorithm
        for j in (n - k)..n {
            let t = rng.random_range(0..=j);
            if buffer.contains(&t) {
                buffer.push(j);
            } else {
                buffer.push(t);
            }
        }
    } else {
        buffer.extend(0..n);
        buffer.shuffle(rng);
        buffer.truncate(k);
    }
}
