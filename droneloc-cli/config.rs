use std::path::Path;

use droneloc_core::{DetectorConfig, DetectorFamily};
use droneloc_geometry::HomographyEstimator;
use droneloc_match::MatchStrategy;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

/// Settings of an evaluation run over a detector roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Detector configurations compared, in report order
    pub detectors: Vec<DetectorConfig>,
    /// Position used as ground truth; the reference image center when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_position: Option<[f64; 2]>,
    /// Worker threads for the roster
    pub threads: usize,
    /// Best matches drawn per rendered image
    pub render_matches: usize,
    pub matching: MatchStrategy,
    pub estimator: HomographyEstimator,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            detectors: DetectorConfig::default_roster(),
            expected_position: None,
            threads: num_cpus::get().max(1),
            render_matches: 50,
            matching: MatchStrategy::default(),
            estimator: HomographyEstimator::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn with_detectors(mut self, detectors: Vec<DetectorConfig>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn with_expected_position(mut self, x: f64, y: f64) -> Self {
        self.expected_position = Some([x, y]);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_matching(mut self, matching: MatchStrategy) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_estimator(mut self, estimator: HomographyEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Every family the roster needs features for, without duplicates
    pub fn families(&self) -> Vec<DetectorFamily> {
        let mut families: Vec<DetectorFamily> = Vec::new();
        for family in self.detectors.iter().flat_map(|d| d.families()) {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.detectors.is_empty() {
            return Err(HarnessError::InvalidConfig("detector roster is empty".into()));
        }
        if self.threads == 0 {
            return Err(HarnessError::InvalidConfig("threads must be at least 1".into()));
        }
        if let Some([x, y]) = self.expected_position {
            if !(x.is_finite() && y.is_finite()) {
                return Err(HarnessError::InvalidConfig(format!(
                    "expected position ({x}, {y}) is not finite"
                )));
            }
        }
        if self.matching.hybrid_limit == 0 {
            return Err(HarnessError::InvalidConfig("hybrid_limit must be at least 1".into()));
        }
        self.matching
            .flann
            .validate()
            .map_err(|e| HarnessError::InvalidConfig(e.to_string()))?;
        self.estimator
            .validate()
            .map_err(|e| HarnessError::InvalidConfig(e.to_string()))?;
        Ok(())
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        let roster: Vec<&str> = self.detectors.iter().map(|d| d.label()).collect();
        format!(
            "detectors=[{}] threads={} flann(trees={}, checks={}) ransac(threshold={}, max_iterations={}) scope={:?}",
            roster.join(", "),
            self.threads,
            self.matching.flann.trees,
            self.matching.flann.checks,
            self.estimator.ransac.threshold,
            self.estimator.ransac.max_iterations,
            self.estimator.scope,
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> HarnessResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml(toml_str: &str) -> HarnessResult<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn load<P: AsRef<Path>>(path: P) -> HarnessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        match extension(path).as_deref() {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(HarnessError::UnknownFormat(path.to_path_buf())),
        }
    }

    /// Save as TOML or JSON depending on the file extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> HarnessResult<()> {
        let path = path.as_ref();
        let content = match extension(path).as_deref() {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => return Err(HarnessError::UnknownFormat(path.to_path_buf())),
        };
        std::fs::write(path, content).map_err(|e| HarnessError::io(path, e))
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
