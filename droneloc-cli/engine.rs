use droneloc_core::{
    CoreError, DetectorConfig, DetectorFamily, FeatureBackend, FeatureExtractor, Features, Image, ImageRole, Keypoint,
    Match, PositionEstimate,
};
use droneloc_geometry::{Homography, HomographyEstimator, Pt2};
use droneloc_match::{ChannelOffset, MatchStrategy};
use serde::Serialize;

use crate::error::LocalizationResult;

/// Outcome of one localization call.
///
/// Match indices point into `reference_keypoints` (source) and
/// `query_keypoints` (target). In hybrid mode both keypoint lists hold the
/// binary-channel keypoints first and the float-channel keypoints after them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Localization {
    pub detector: DetectorConfig,
    /// Query image center expressed in reference pixel coordinates
    pub position: PositionEstimate,
    /// Maps query pixels to reference pixels
    pub homography: Homography,
    pub matches: Vec<Match>,
    pub reference_keypoints: Vec<Keypoint>,
    pub query_keypoints: Vec<Keypoint>,
    /// Indices into `matches` that RANSAC kept
    pub inliers: Vec<usize>,
}

impl Localization {
    /// Matches per keypoint over both images, 0 when neither has any
    pub fn match_density(&self) -> f64 {
        match_density(
            self.matches.len(),
            self.reference_keypoints.len(),
            self.query_keypoints.len(),
        )
    }
}

pub fn match_density(matches: usize, reference_keypoints: usize, query_keypoints: usize) -> f64 {
    let total = reference_keypoints + query_keypoints;
    if total == 0 {
        0.0
    } else {
        matches as f64 / total as f64
    }
}

/// Locates a drone (query) image inside a satellite (reference) image:
/// extract, match, estimate a homography, project the query center.
#[derive(Debug, Clone)]
pub struct LocalizationEngine<B> {
    backend: B,
    strategy: MatchStrategy,
    estimator: HomographyEstimator,
}

impl<B: FeatureBackend> LocalizationEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            strategy: MatchStrategy::default(),
            estimator: HomographyEstimator::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_estimator(mut self, estimator: HomographyEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn strategy(&self) -> &MatchStrategy {
        &self.strategy
    }

    pub fn estimator(&self) -> &HomographyEstimator {
        &self.estimator
    }

    /// Parse `name` and localize; unknown names fail before any extraction
    pub fn localize_named(&self, name: &str, reference: &Image, query: &Image) -> LocalizationResult<Localization> {
        let detector: DetectorConfig = name.parse()?;
        self.localize(reference, query, detector)
    }

    pub fn localize(&self, reference: &Image, query: &Image, detector: DetectorConfig) -> LocalizationResult<Localization> {
        let (matches, reference_keypoints, query_keypoints) = match detector {
            DetectorConfig::Single(family) => self.match_single(reference, query, family)?,
            DetectorConfig::Hybrid => self.match_hybrid(reference, query)?,
        };

        let src: Vec<Pt2> = matches
            .iter()
            .map(|m| to_point(&reference_keypoints[m.source_idx]))
            .collect();
        let dst: Vec<Pt2> = matches
            .iter()
            .map(|m| to_point(&query_keypoints[m.target_idx]))
            .collect();

        // Fit query -> reference so the query center can be carried over.
        let estimate = self.estimator.estimate(&dst, &src)?;
        let center = estimate.homography.project_center(query.width(), query.height())?;

        Ok(Localization {
            detector,
            position: PositionEstimate::new(center.x, center.y),
            homography: estimate.homography,
            matches,
            reference_keypoints,
            query_keypoints,
            inliers: estimate.inliers,
        })
    }

    fn match_single(
        &self,
        reference: &Image,
        query: &Image,
        family: DetectorFamily,
    ) -> LocalizationResult<(Vec<Match>, Vec<Keypoint>, Vec<Keypoint>)> {
        let detector = DetectorConfig::Single(family);
        let extractor = FeatureExtractor::new(&self.backend, family);

        let reference_features = extractor.extract(reference)?;
        if reference_features.is_empty() {
            return Err(empty(ImageRole::Reference, detector));
        }
        let query_features = extractor.extract(query)?;
        if query_features.is_empty() {
            return Err(empty(ImageRole::Query, detector));
        }

        let matches = self
            .strategy
            .match_descriptors(reference_features.descriptors(), query_features.descriptors())?;
        let (reference_keypoints, _) = reference_features.into_parts();
        let (query_keypoints, _) = query_features.into_parts();
        Ok((matches, reference_keypoints, query_keypoints))
    }

    fn match_hybrid(
        &self,
        reference: &Image,
        query: &Image,
    ) -> LocalizationResult<(Vec<Match>, Vec<Keypoint>, Vec<Keypoint>)> {
        let binary = FeatureExtractor::new(&self.backend, DetectorConfig::HYBRID_BINARY_FAMILY);
        let float = FeatureExtractor::new(&self.backend, DetectorConfig::HYBRID_FLOAT_FAMILY);

        let reference_binary = binary.extract(reference)?;
        let reference_float = float.extract(reference)?;
        if reference_binary.is_empty() && reference_float.is_empty() {
            return Err(empty(ImageRole::Reference, DetectorConfig::Hybrid));
        }
        let query_binary = binary.extract(query)?;
        let query_float = float.extract(query)?;
        if query_binary.is_empty() && query_float.is_empty() {
            return Err(empty(ImageRole::Query, DetectorConfig::Hybrid));
        }

        let offset = ChannelOffset {
            source: reference_binary.len(),
            target: query_binary.len(),
        };
        let matches = self.strategy.match_hybrid(
            (reference_binary.descriptors(), query_binary.descriptors()),
            (reference_float.descriptors(), query_float.descriptors()),
            offset,
        )?;

        Ok((
            matches,
            concat_keypoints(reference_binary, reference_float),
            concat_keypoints(query_binary, query_float),
        ))
    }
}

fn empty(role: ImageRole, detector: DetectorConfig) -> crate::error::LocalizationError {
    CoreError::EmptyKeypoints { role, detector }.into()
}

fn concat_keypoints(first: Features, second: Features) -> Vec<Keypoint> {
    let (mut keypoints, _) = first.into_parts();
    keypoints.extend(second.into_parts().0);
    keypoints
}

fn to_point(kp: &Keypoint) -> Pt2 {
    Pt2::new(f64::from(kp.x), f64::from(kp.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use droneloc_core::{DescriptorKind, DescriptorSet, PrecomputedFeatures};
    use droneloc_geometry::GeometryError;

    use crate::error::{ErrorCategory, LocalizationError};

    fn square_keypoints() -> Vec<Keypoint> {
        vec![
            Keypoint::new(10.0, 10.0),
            Keypoint::new(90.0, 12.0),
            Keypoint::new(85.0, 70.0),
            Keypoint::new(12.0, 66.0),
            Keypoint::new(47.0, 31.0),
        ]
    }

    fn orb_rows(n: usize) -> Vec<Vec<u8>> {
        // Distinct rows differ in every byte.
        (0..n).map(|i| vec![(i as u8).wrapping_mul(37); 32]).collect()
    }

    #[test]
    fn test_identity_homography_gives_query_center() {
        let reference = Image::filled(100, 80, 10).unwrap();
        let query = Image::filled(100, 80, 20).unwrap();
        let kps = square_keypoints();
        let features = Features::new(kps.clone(), DescriptorSet::Binary(orb_rows(kps.len()))).unwrap();
        let backend = PrecomputedFeatures::new()
            .with(&reference, DetectorFamily::Orb, features.clone())
            .with(&query, DetectorFamily::Orb, features);

        let engine = LocalizationEngine::new(backend);
        let loc = engine
            .localize(&reference, &query, DetectorConfig::Single(DetectorFamily::Orb))
            .unwrap();
        assert!((loc.position.x - 50.0).abs() < 1e-9);
        assert!((loc.position.y - 40.0).abs() < 1e-9);
        assert_eq!(loc.matches.len(), 5);
        assert_eq!(loc.inliers.len(), 5);
        assert!((loc.match_density() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_three_matches_are_insufficient() {
        let reference = Image::filled(64, 64, 1).unwrap();
        let query = Image::filled(32, 32, 2).unwrap();
        let kps: Vec<Keypoint> = square_keypoints().into_iter().take(3).collect();
        let features = Features::new(kps, DescriptorSet::Binary(orb_rows(3))).unwrap();
        let backend = PrecomputedFeatures::new()
            .with(&reference, DetectorFamily::Brisk, features.clone())
            .with(&query, DetectorFamily::Brisk, features);

        let err = LocalizationEngine::new(backend)
            .localize(&reference, &query, DetectorConfig::Single(DetectorFamily::Brisk))
            .unwrap_err();
        assert_eq!(
            err,
            LocalizationError::Geometry(GeometryError::InsufficientCorrespondences { found: 3, required: 4 })
        );
        assert_eq!(err.category(), ErrorCategory::DegenerateInput);
    }

    #[test]
    fn test_empty_query_keypoints() {
        let reference = Image::filled(64, 64, 1).unwrap();
        let query = Image::filled(32, 32, 2).unwrap();
        let backend = PrecomputedFeatures::new()
            .with(
                &reference,
                DetectorFamily::Sift,
                Features::new(square_keypoints(), DescriptorSet::Float(vec![vec![0.5; 8]; 5])).unwrap(),
            )
            .with(&query, DetectorFamily::Sift, Features::empty(DescriptorKind::Float));

        let err = LocalizationEngine::new(backend)
            .localize(&reference, &query, DetectorConfig::Single(DetectorFamily::Sift))
            .unwrap_err();
        assert_eq!(
            err,
            LocalizationError::Core(CoreError::EmptyKeypoints {
                role: ImageRole::Query,
                detector: DetectorConfig::Single(DetectorFamily::Sift),
            })
        );
        assert_eq!(err.category(), ErrorCategory::DegenerateInput);
    }

    #[test]
    fn test_hybrid_all_channels_empty() {
        let reference = Image::filled(64, 64, 1).unwrap();
        let query = Image::filled(32, 32, 2).unwrap();
        let backend = PrecomputedFeatures::new()
            .with(&reference, DetectorFamily::Orb, Features::empty(DescriptorKind::Binary))
            .with(&reference, DetectorFamily::Sift, Features::empty(DescriptorKind::Float))
            .with(&query, DetectorFamily::Orb, Features::empty(DescriptorKind::Binary))
            .with(&query, DetectorFamily::Sift, Features::empty(DescriptorKind::Float));

        let err = LocalizationEngine::new(backend)
            .localize(&reference, &query, DetectorConfig::Hybrid)
            .unwrap_err();
        assert!(matches!(
            err,
            LocalizationError::Core(CoreError::EmptyKeypoints {
                role: ImageRole::Reference,
                detector: DetectorConfig::Hybrid,
            })
        ));
    }

    #[test]
    fn test_missing_features_are_backend_failures() {
        let reference = Image::filled(64, 64, 1).unwrap();
        let query = Image::filled(32, 32, 2).unwrap();
        let err = LocalizationEngine::new(PrecomputedFeatures::new())
            .localize_named("akaze", &reference, &query)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Backend);
    }

    #[test]
    fn test_density_of_nothing() {
        assert_eq!(match_density(0, 0, 0), 0.0);
        assert_eq!(match_density(10, 30, 20), 0.2);
    }
}
