use crate::dlt::MIN_CORRESPONDENCES;
use crate::error::{GeometryError, GeometryResult};
use crate::homography::{Homography, Pt2};
use crate::ransac::{ransac_homography, RansacConfig};
use crate::refine::{refine_homography, RefineConfig, RefineSummary};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which correspondences the least-squares stage sees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RefinementScope {
    /// Every correspondence, outliers included
    #[default]
    All,
    /// Only the RANSAC consensus set
    Inliers,
}

/// Two-stage estimator: RANSAC for a robust initial model, then
/// Levenberg-Marquardt on the chosen correspondences.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HomographyEstimator {
    pub scope: RefinementScope,
    pub ransac: RansacConfig,
    pub refine: RefineConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub homography: Homography,
    /// RANSAC consensus set, ascending
    pub inliers: Vec<usize>,
    pub ransac_iterations: usize,
    pub refinement: RefineSummary,
}

impl HomographyEstimator {
    pub fn new(ransac: RansacConfig, refine: RefineConfig, scope: RefinementScope) -> Self {
        Self { ransac, refine, scope }
    }

    pub fn with_scope(mut self, scope: RefinementScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn validate(&self) -> GeometryResult<()> {
        self.ransac.validate()?;
        self.refine.validate()
    }

    /// Estimate `H` with `dst ~ H src`
    pub fn estimate(&self, src: &[Pt2], dst: &[Pt2]) -> GeometryResult<Estimate> {
        if src.len() != dst.len() {
            return Err(GeometryError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        if src.len() < MIN_CORRESPONDENCES {
            return Err(GeometryError::InsufficientCorrespondences {
                found: src.len(),
                required: MIN_CORRESPONDENCES,
            });
        }

        let robust = ransac_homography(src, dst, &self.ransac)?;

        let (homography, refinement) = match self.scope {
            RefinementScope::All => refine_homography(&robust.homography, src, dst, &self.refine)?,
            RefinementScope::Inliers => {
                let in_src: Vec<Pt2> = robust.inliers.iter().map(|&i| src[i]).collect();
                let in_dst: Vec<Pt2> = robust.inliers.iter().map(|&i| dst[i]).collect();
                refine_homography(&robust.homography, &in_src, &in_dst, &self.refine)?
            }
        };

        Ok(Estimate {
            homography,
            inliers: robust.inliers,
            ransac_iterations: robust.iterations,
            refinement,
        })
    }
}
