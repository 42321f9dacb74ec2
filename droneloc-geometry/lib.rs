//! Homography estimation between a drone image and a satellite reference.
//!
//! [`HomographyEstimator`] runs a seeded RANSAC over normalized-DLT minimal
//! samples and then polishes the consensus model with Levenberg-Marquardt.

pub mod dlt;
pub mod error;
pub mod estimator;
pub mod homography;
pub mod ransac;
pub mod refine;

pub use dlt::{dlt_homography, normalize_points, MIN_CORRESPONDENCES};
pub use error::{GeometryError, GeometryResult};
pub use estimator::{Estimate, HomographyEstimator, RefinementScope};
pub use homography::{project_center, Homography, Pt2};
pub use ransac::{adaptive_iterations, ransac_homography, RansacConfig, RansacOutcome, SeedMode, DEFAULT_SEED};
pub use refine::{refine_homography, RefineConfig, RefineSummary};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_exact_correspondences_project_center(
            angle in -0.5f64..0.5,
            scale in 0.3f64..2.0,
            tx in -300.0f64..300.0,
            ty in -300.0f64..300.0,
            px in -2e-4f64..2e-4,
            py in -2e-4f64..2e-4,
            seed in any::<u64>(),
            n in 8usize..40,
        ) {
            let (s, c) = angle.sin_cos();
            let h = Homography::from_rows([
                [scale * c, -scale * s, tx],
                [scale * s, scale * c, ty],
                [px, py, 1.0],
            ]);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let src: Vec<Pt2> = (0..n)
                .map(|_| Pt2::new(rng.random_range(0.0..640.0), rng.random_range(0.0..480.0)))
                .collect();
            let dst: Vec<Pt2> = src.iter().map(|p| h.project(p).unwrap()).collect();

            let estimate = HomographyEstimator::default().estimate(&src, &dst).unwrap();
            let expected = h.project_center(640, 480).unwrap();
            let got = estimate.homography.project_center(640, 480).unwrap();
            prop_assert!(nalgebra::distance(&expected, &got) < 1e-4);
        }

        #[test]
        fn prop_fewer_than_four_pairs_rejected(n in 0usize..4) {
            let pts: Vec<Pt2> = (0..n).map(|i| Pt2::new(i as f64, (i * i) as f64)).collect();
            prop_assert_eq!(
                HomographyEstimator::default().estimate(&pts, &pts),
                Err(GeometryError::InsufficientCorrespondences { found: n, required: 4 })
            );
        }
    }
}
