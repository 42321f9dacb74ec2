//! High-level drone-to-satellite localization: the [`LocalizationEngine`]
//! pipeline, the multi-detector evaluation harness, feature sidecar files and
//! match rendering.

pub mod config;
pub mod engine;
pub mod error;
pub mod harness;
pub mod render;
pub mod sidecar;

pub use droneloc_core::{
    self, DetectorConfig, DetectorFamily, FeatureBackend, Features, Image, Keypoint, Match, PositionEstimate,
    PrecomputedFeatures,
};
pub use droneloc_geometry::{self, Homography, HomographyEstimator, RefinementScope};
pub use droneloc_match::{self, MatchStrategy};

pub use config::EvaluationConfig;
pub use engine::{match_density, Localization, LocalizationEngine};
pub use error::{ErrorCategory, HarnessError, HarnessResult, LocalizationError, LocalizationResult};
pub use harness::{
    EvaluationObserver, EvaluationOutcome, EvaluationRecord, EvaluationReport, EvaluationRun, Evaluator,
    TracingObserver,
};
pub use render::{load_grayscale, render_matches, render_path, save_render};
pub use sidecar::{load_precomputed, read_features, sidecar_path, write_features};
