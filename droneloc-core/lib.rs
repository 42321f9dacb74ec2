//! Core data model for drone-to-satellite localization: images, keypoints,
//! descriptor sets, correspondences, detector selection and the feature
//! extraction boundary.

pub mod backend;
pub mod detector;
pub mod error;
pub mod types;

pub use backend::{FeatureBackend, FeatureExtractor, ImageKey, PrecomputedFeatures};
pub use detector::{DetectorConfig, DetectorFamily};
pub use error::{CoreError, CoreResult};
pub use types::{
    sort_by_distance, DescriptorKind, DescriptorSet, Features, Image, ImageRole, Keypoint, Match,
    PositionEstimate,
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn binary_features(n: usize) -> Features {
        let kps = (0..n).map(|i| Keypoint::new(i as f32, 2.0 * i as f32)).collect();
        let desc = (0..n).map(|i| vec![i as u8; 32]).collect();
        Features::new(kps, DescriptorSet::Binary(desc)).unwrap()
    }

    struct CountingBackend {
        calls: AtomicUsize,
        features: Features,
    }

    impl FeatureBackend for CountingBackend {
        fn detect_and_compute(&self, _family: DetectorFamily, _image: &Image) -> CoreResult<Features> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.features.clone())
        }
    }

    #[test]
    fn test_image_validation() {
        assert!(Image::new(4, 3, vec![0; 12]).is_ok());
        assert!(matches!(
            Image::new(4, 3, vec![0; 11]),
            Err(CoreError::InvalidImageData { expected_len: 12, actual_len: 11, .. })
        ));
        assert!(matches!(
            Image::new(0, 3, Vec::new()),
            Err(CoreError::InvalidImageData { .. })
        ));
    }

    #[test]
    fn test_image_center() {
        let img = Image::filled(100, 80, 0).unwrap();
        assert_eq!(img.center(), (50.0, 40.0));

        let odd = Image::filled(5, 3, 0).unwrap();
        assert_eq!(odd.center(), (2.5, 1.5));
    }

    #[test]
    fn test_features_reject_mismatched_lengths() {
        let kps = vec![Keypoint::new(0.0, 0.0); 3];
        let desc = DescriptorSet::Float(vec![vec![0.0; 8]; 2]);
        assert_eq!(
            Features::new(kps, desc),
            Err(CoreError::FeatureCountMismatch { keypoints: 3, descriptors: 2 })
        );
    }

    #[test]
    fn test_detector_family_parsing() {
        assert_eq!("sift".parse::<DetectorFamily>(), Ok(DetectorFamily::Sift));
        assert_eq!(" ORB ".parse::<DetectorFamily>(), Ok(DetectorFamily::Orb));
        assert_eq!("akaze".parse::<DetectorFamily>(), Ok(DetectorFamily::Akaze));
        assert_eq!("Brisk".parse::<DetectorFamily>(), Ok(DetectorFamily::Brisk));
    }

    #[test]
    fn test_detector_config_parsing() {
        assert_eq!("hfm".parse::<DetectorConfig>(), Ok(DetectorConfig::Hybrid));
        assert_eq!("hybrid".parse::<DetectorConfig>(), Ok(DetectorConfig::Hybrid));
        assert_eq!(
            "akaze".parse::<DetectorConfig>(),
            Ok(DetectorConfig::Single(DetectorFamily::Akaze))
        );
        assert_eq!(
            "not-a-real-detector".parse::<DetectorConfig>(),
            Err(CoreError::UnsupportedDetector("not-a-real-detector".to_string()))
        );
    }

    #[test]
    fn test_default_roster_labels() {
        let labels: Vec<&str> = DetectorConfig::default_roster().iter().map(|d| d.label()).collect();
        assert_eq!(labels, vec!["sift", "orb", "akaze", "brisk", "hfm"]);
        for cfg in DetectorConfig::default_roster() {
            assert_eq!(cfg.label().parse::<DetectorConfig>(), Ok(cfg));
        }
    }

    #[test]
    fn test_descriptor_kinds() {
        assert_eq!(DetectorFamily::Sift.descriptor_kind(), DescriptorKind::Float);
        assert_eq!(DetectorFamily::Akaze.descriptor_kind(), DescriptorKind::Float);
        assert_eq!(DetectorFamily::Orb.descriptor_kind(), DescriptorKind::Binary);
        assert_eq!(DetectorFamily::Brisk.descriptor_kind(), DescriptorKind::Binary);
        assert_eq!(
            DetectorConfig::Hybrid.families(),
            vec![DetectorFamily::Orb, DetectorFamily::Sift]
        );
    }

    #[test]
    fn test_extractor_rejects_wrong_kind() {
        let backend = CountingBackend {
            calls: AtomicUsize::new(0),
            features: binary_features(4),
        };
        let img = Image::filled(16, 16, 0).unwrap();

        let orb = FeatureExtractor::new(&backend, DetectorFamily::Orb);
        assert_eq!(orb.extract(&img).unwrap().len(), 4);

        let sift = FeatureExtractor::new(&backend, DetectorFamily::Sift);
        assert!(matches!(
            sift.extract(&img),
            Err(CoreError::DescriptorKindMismatch {
                family: DetectorFamily::Sift,
                expected: DescriptorKind::Float,
                actual: DescriptorKind::Binary,
            })
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_precomputed_lookup_by_content() {
        let a = Image::filled(8, 8, 10).unwrap();
        let b = Image::filled(8, 8, 11).unwrap();
        let backend = PrecomputedFeatures::new().with(&a, DetectorFamily::Orb, binary_features(5));

        assert!(backend.contains(&a, DetectorFamily::Orb));
        assert!(!backend.contains(&b, DetectorFamily::Orb));
        assert!(!backend.contains(&a, DetectorFamily::Brisk));

        assert_eq!(backend.detect_and_compute(DetectorFamily::Orb, &a).unwrap().len(), 5);
        assert!(matches!(
            backend.detect_and_compute(DetectorFamily::Orb, &b),
            Err(CoreError::Backend { family: DetectorFamily::Orb, .. })
        ));
    }

    #[test]
    fn test_sort_by_distance_is_stable() {
        let mut matches = vec![
            Match::new(0, 0, 3.0),
            Match::new(1, 1, 1.0),
            Match::new(2, 2, 3.0),
            Match::new(3, 3, 0.5),
        ];
        sort_by_distance(&mut matches);
        let order: Vec<usize> = matches.iter().map(|m| m.source_idx).collect();
        assert_eq!(order, vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_position_distance() {
        let p = PositionEstimate::new(3.0, 4.0);
        assert!((p.distance_to(0.0, 0.0) - 5.0).abs() < 1e-12);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_shapes() {
        let cfg: Vec<DetectorConfig> = serde_json::from_str(r#"["sift", "hfm"]"#).unwrap();
        assert_eq!(cfg, vec![DetectorConfig::Single(DetectorFamily::Sift), DetectorConfig::Hybrid]);
        assert!(serde_json::from_str::<DetectorConfig>(r#""surf""#).is_err());

        let desc: DescriptorSet = serde_json::from_str(r#"{"kind":"binary","rows":[[1,2],[3,4]]}"#).unwrap();
        assert_eq!(desc, DescriptorSet::Binary(vec![vec![1, 2], vec![3, 4]]));

        let kp: Keypoint = serde_json::from_str(r#"{"x":1.5,"y":2.5}"#).unwrap();
        assert_eq!(kp, Keypoint::new(1.5, 2.5));
    }

    proptest! {
        #[test]
        fn prop_features_keep_lengths_parallel(n_kp in 0usize..40, n_desc in 0usize..40) {
            let kps = vec![Keypoint::new(1.0, 1.0); n_kp];
            let desc = DescriptorSet::Binary(vec![vec![0u8; 32]; n_desc]);
            match Features::new(kps, desc) {
                Ok(f) => {
                    prop_assert_eq!(n_kp, n_desc);
                    prop_assert_eq!(f.keypoints().len(), f.descriptors().len());
                }
                Err(e) => {
                    prop_assert_ne!(n_kp, n_desc);
                    prop_assert_eq!(e, CoreError::FeatureCountMismatch { keypoints: n_kp, descriptors: n_desc });
                }
            }
        }
    }
}
