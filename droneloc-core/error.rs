use crate::detector::{DetectorConfig, DetectorFamily};
use crate::types::{DescriptorKind, ImageRole};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("unsupported detector: {0:?}")]
    UnsupportedDetector(String),

    #[error("invalid image: {width}x{height} with {actual_len} bytes (expected {expected_len})")]
    InvalidImageData {
        width: usize,
        height: usize,
        expected_len: usize,
        actual_len: usize,
    },

    #[error("feature count mismatch: {keypoints} keypoints vs {descriptors} descriptors")]
    FeatureCountMismatch { keypoints: usize, descriptors: usize },

    #[error("{family} produced {actual} descriptors, expected {expected}")]
    DescriptorKindMismatch {
        family: DetectorFamily,
        expected: DescriptorKind,
        actual: DescriptorKind,
    },

    #[error("{role} image has no keypoints for detector {detector}")]
    EmptyKeypoints {
        role: ImageRole,
        detector: DetectorConfig,
    },

    #[error("feature backend failed for {family}: {message}")]
    Backend {
        family: DetectorFamily,
        message: String,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;
