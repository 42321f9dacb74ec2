//! Runs a detector roster over one reference/query pair and collects
//! per-detector metrics into a report.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use droneloc_core::{DetectorConfig, FeatureBackend, Image, PositionEstimate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EvaluationConfig;
use crate::engine::{Localization, LocalizationEngine};
use crate::error::{ErrorCategory, HarnessError, HarnessResult, LocalizationError};

/// Metrics of one successful roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub detector: DetectorConfig,
    /// Wall-clock time of the localization call, in seconds
    pub computation_time: f64,
    pub match_count: usize,
    pub inlier_count: usize,
    pub position: PositionEstimate,
    /// Euclidean distance to the expected position, in reference pixels
    pub position_error: f64,
    /// `matches / (reference keypoints + query keypoints)`
    pub match_density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Completed(EvaluationRecord),
    Failed {
        detector: DetectorConfig,
        category: ErrorCategory,
        message: String,
    },
}

impl EvaluationOutcome {
    pub fn detector(&self) -> DetectorConfig {
        match self {
            EvaluationOutcome::Completed(record) => record.detector,
            EvaluationOutcome::Failed { detector, .. } => *detector,
        }
    }

    pub fn record(&self) -> Option<&EvaluationRecord> {
        match self {
            EvaluationOutcome::Completed(record) => Some(record),
            EvaluationOutcome::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, EvaluationOutcome::Completed(_))
    }
}

/// Outcomes in roster order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub reference_size: (usize, usize),
    pub query_size: (usize, usize),
    pub expected_position: PositionEstimate,
    pub outcomes: Vec<EvaluationOutcome>,
}

impl EvaluationReport {
    pub fn completed(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.outcomes.iter().filter_map(EvaluationOutcome::record)
    }

    /// Completed entry with the smallest position error
    pub fn best(&self) -> Option<&EvaluationRecord> {
        self.completed()
            .min_by(|a, b| a.position_error.total_cmp(&b.position_error))
    }

    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<8} {:>10} {:>8} {:>8} {:>12} {:>12} {:>8}",
            "detector", "time (s)", "matches", "inliers", "x", "y", "error"
        );
        let _ = writeln!(out, "{}", "-".repeat(72));
        for outcome in &self.outcomes {
            match outcome {
                EvaluationOutcome::Completed(r) => {
                    let _ = writeln!(
                        out,
                        "{:<8} {:>10.4} {:>8} {:>8} {:>12.2} {:>12.2} {:>8.2}",
                        r.detector.label(),
                        r.computation_time,
                        r.match_count,
                        r.inlier_count,
                        r.position.x,
                        r.position.y,
                        r.position_error
                    );
                }
                EvaluationOutcome::Failed {
                    detector,
                    category,
                    message,
                } => {
                    let _ = writeln!(out, "{:<8} failed ({category}): {message}", detector.label());
                }
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> HarnessResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| HarnessError::io(path, e))
    }
}

/// Sink for harness progress, called from worker threads
pub trait EvaluationObserver: Send + Sync {
    fn on_start(&self, _detector: DetectorConfig) {}
    fn on_complete(&self, _record: &EvaluationRecord) {}
    fn on_failure(&self, _detector: DetectorConfig, _error: &LocalizationError) {}
}

/// Ignores every event
impl EvaluationObserver for () {}

/// Emits harness progress as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EvaluationObserver for TracingObserver {
    fn on_start(&self, detector: DetectorConfig) {
        info!(detector = %detector, "localizing");
    }

    fn on_complete(&self, record: &EvaluationRecord) {
        info!(
            detector = %record.detector,
            time_s = record.computation_time,
            matches = record.match_count,
            inliers = record.inlier_count,
            x = record.position.x,
            y = record.position.y,
            error_px = record.position_error,
            "localized"
        );
    }

    fn on_failure(&self, detector: DetectorConfig, error: &LocalizationError) {
        warn!(detector = %detector, category = %error.category(), "localization failed: {error}");
    }
}

/// Results of a run: the report plus the full localizations of completed
/// entries, for rendering.
#[derive(Debug, Clone)]
pub struct EvaluationRun {
    pub report: EvaluationReport,
    pub localizations: Vec<Localization>,
}

pub struct Evaluator<B> {
    engine: LocalizationEngine<B>,
    config: EvaluationConfig,
    pool: rayon::ThreadPool,
}

impl<B: FeatureBackend> Evaluator<B> {
    pub fn new(backend: B, config: EvaluationConfig) -> HarnessResult<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("droneloc-eval-{i}"))
            .build()?;
        let engine = LocalizationEngine::new(backend)
            .with_strategy(config.matching.clone())
            .with_estimator(config.estimator.clone());
        Ok(Self { engine, config, pool })
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn engine(&self) -> &LocalizationEngine<B> {
        &self.engine
    }

    /// Localize with every roster entry. Failures are recorded, never raised.
    pub fn evaluate(&self, reference: &Image, query: &Image, observer: &dyn EvaluationObserver) -> EvaluationRun {
        let expected = match self.config.expected_position {
            Some([x, y]) => PositionEstimate::new(x, y),
            None => {
                let (x, y) = reference.center();
                PositionEstimate::new(x, y)
            }
        };

        let results: Vec<(EvaluationOutcome, Option<Localization>)> = self.pool.install(|| {
            self.config
                .detectors
                .par_iter()
                .map(|&detector| self.run_one(reference, query, detector, expected, observer))
                .collect()
        });

        let (outcomes, localizations): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        EvaluationRun {
            report: EvaluationReport {
                reference_size: reference.dimensions(),
                query_size: query.dimensions(),
                expected_position: expected,
                outcomes,
            },
            localizations: localizations.into_iter().flatten().collect(),
        }
    }

    fn run_one(
        &self,
        reference: &Image,
        query: &Image,
        detector: DetectorConfig,
        expected: PositionEstimate,
        observer: &dyn EvaluationObserver,
    ) -> (EvaluationOutcome, Option<Localization>) {
        observer.on_start(detector);
        let start = Instant::now();
        let result = self.engine.localize(reference, query, detector);
        let computation_time = start.elapsed().as_secs_f64();

        match result {
            Ok(localization) => {
                let record = EvaluationRecord {
                    detector,
                    computation_time,
                    match_count: localization.matches.len(),
                    inlier_count: localization.inliers.len(),
                    position: localization.position,
                    position_error: localization.position.distance_to(expected.x, expected.y),
                    match_density: localization.match_density(),
                };
                observer.on_complete(&record);
                (EvaluationOutcome::Completed(record), Some(localization))
            }
            Err(error) => {
                observer.on_failure(detector, &error);
                let outcome = EvaluationOutcome::Failed {
                    detector,
                    category: error.category(),
                    message: error.to_string(),
                };
                (outcome, None)
            }
        }
    }
}
