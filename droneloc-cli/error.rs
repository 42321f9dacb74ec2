use std::path::PathBuf;

use droneloc_core::CoreError;
use droneloc_geometry::GeometryError;
use droneloc_match::MatchError;
use serde::{Deserialize, Serialize};

/// Coarse classification of a failed localization, reported per detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    DegenerateInput,
    EstimationFailure,
    Backend,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::DegenerateInput => "degenerate input",
            ErrorCategory::EstimationFailure => "estimation failure",
            ErrorCategory::Backend => "backend",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocalizationError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl LocalizationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LocalizationError::Core(err) => match err {
                CoreError::UnsupportedDetector(_) | CoreError::DescriptorKindMismatch { .. } => {
                    ErrorCategory::Configuration
                }
                CoreError::InvalidImageData { .. }
                | CoreError::FeatureCountMismatch { .. }
                | CoreError::EmptyKeypoints { .. } => ErrorCategory::DegenerateInput,
                CoreError::Backend { .. } => ErrorCategory::Backend,
            },
            LocalizationError::Match(err) => match err {
                MatchError::KindMismatch { .. } | MatchError::InvalidParams(_) => ErrorCategory::Configuration,
                MatchError::DimensionMismatch { .. } | MatchError::ZeroWidth => ErrorCategory::DegenerateInput,
            },
            LocalizationError::Geometry(err) => match err {
                GeometryError::InvalidParams(_) => ErrorCategory::Configuration,
                GeometryError::InsufficientCorrespondences { .. } | GeometryError::LengthMismatch { .. } => {
                    ErrorCategory::DegenerateInput
                }
                GeometryError::Degenerate
                | GeometryError::NoConsensus { .. }
                | GeometryError::NonFinite
                | GeometryError::PointAtInfinity { .. } => ErrorCategory::EstimationFailure,
            },
        }
    }
}

pub type LocalizationResult<T> = Result<T, LocalizationError>;

/// Failures of the evaluation harness and the command line around it
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unrecognized config format for {} (expected .toml or .json)", .0.display())]
    UnknownFormat(PathBuf),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Localization(#[from] LocalizationError),
}

impl HarnessError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
