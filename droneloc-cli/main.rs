//! droneloc CLI: locate a drone image inside a satellite image.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use droneloc::{
    load_grayscale, load_precomputed, render_matches, render_path, save_render, DetectorConfig, EvaluationConfig,
    Evaluator, HarnessResult, Image, LocalizationEngine, PrecomputedFeatures, TracingObserver,
};

#[derive(Parser)]
#[command(name = "droneloc")]
#[command(about = "Estimate where a drone image lies inside a satellite image via feature matching and homography")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Localize the query image with one detector configuration.
    Localize(LocalizeArgs),

    /// Compare a roster of detector configurations on one image pair.
    Evaluate(EvaluateArgs),
}

#[derive(Debug, Clone, Args)]
struct InputArgs {
    /// Satellite (reference) image.
    #[arg(long)]
    reference: PathBuf,

    /// Drone (query) image.
    #[arg(long)]
    query: PathBuf,

    /// Directory holding `<image stem>.<family>.json` feature files.
    #[arg(long)]
    features_dir: PathBuf,

    /// Evaluation config (.toml or .json) providing matcher and estimator settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct LocalizeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Detector: sift, orb, akaze, brisk or hfm.
    #[arg(long, default_value = "sift")]
    detector: String,

    /// Write the side-by-side match image here.
    #[arg(long)]
    render: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct EvaluateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Write the JSON report here.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write `matches_<detector>.png` for each completed detector into this directory.
    #[arg(long)]
    render_dir: Option<PathBuf>,
}

fn main() -> HarnessResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Localize(args) => run_localize(args),
        Commands::Evaluate(args) => run_evaluate(args),
    }
}

struct Inputs {
    config: EvaluationConfig,
    reference: Image,
    query: Image,
}

fn load_inputs(input: &InputArgs) -> HarnessResult<Inputs> {
    let config = match &input.config {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            EvaluationConfig::load(path)?
        }
        None => EvaluationConfig::default(),
    };

    tracing::info!("Loading reference image: {}", input.reference.display());
    let reference = load_grayscale(&input.reference)?;
    tracing::info!("Loading query image: {}", input.query.display());
    let query = load_grayscale(&input.query)?;
    tracing::info!(
        "Reference {}x{}, query {}x{}",
        reference.width(),
        reference.height(),
        query.width(),
        query.height()
    );

    Ok(Inputs {
        config,
        reference,
        query,
    })
}

fn load_features(input: &InputArgs, inputs: &Inputs, config: &EvaluationConfig) -> HarnessResult<PrecomputedFeatures> {
    let images: [(&Path, &Image); 2] = [
        (input.reference.as_path(), &inputs.reference),
        (input.query.as_path(), &inputs.query),
    ];
    let features = load_precomputed(&input.features_dir, &images, &config.families())?;
    tracing::info!("Loaded {} feature sidecars from {}", features.len(), input.features_dir.display());
    Ok(features)
}

fn run_localize(args: LocalizeArgs) -> HarnessResult<()> {
    let detector: DetectorConfig = args.detector.parse()?;
    let inputs = load_inputs(&args.input)?;
    let config = inputs.config.clone().with_detectors(vec![detector]);
    let backend = load_features(&args.input, &inputs, &config)?;

    let engine = LocalizationEngine::new(backend)
        .with_strategy(config.matching.clone())
        .with_estimator(config.estimator.clone());
    let localization = engine.localize(&inputs.reference, &inputs.query, detector)?;

    println!("detector:   {}", detector);
    println!("position:   ({:.2}, {:.2})", localization.position.x, localization.position.y);
    println!("matches:    {}", localization.matches.len());
    println!("inliers:    {}", localization.inliers.len());
    println!(
        "keypoints:  {} reference, {} query",
        localization.reference_keypoints.len(),
        localization.query_keypoints.len()
    );
    println!("density:    {:.4}", localization.match_density());

    if let Some(path) = &args.render {
        let canvas = render_matches(&inputs.reference, &inputs.query, &localization, config.render_matches);
        save_render(&canvas, path)?;
        tracing::info!("Match image written to {}", path.display());
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> HarnessResult<()> {
    let inputs = load_inputs(&args.input)?;
    let config = inputs.config.clone();
    tracing::info!("Evaluation: {}", config.summary());
    let backend = load_features(&args.input, &inputs, &config)?;

    let evaluator = Evaluator::new(backend, config)?;
    let run = evaluator.evaluate(&inputs.reference, &inputs.query, &TracingObserver);

    print!("{}", run.report.summary_table());
    if let Some(best) = run.report.best() {
        println!(
            "best: {} ({:.2} px from ({:.1}, {:.1}))",
            best.detector, best.position_error, run.report.expected_position.x, run.report.expected_position.y
        );
    }

    if let Some(path) = &args.report {
        run.report.save_json(path)?;
        tracing::info!("Report written to {}", path.display());
    }

    if let Some(dir) = &args.render_dir {
        std::fs::create_dir_all(dir).map_err(|e| droneloc::HarnessError::Io {
            path: dir.clone(),
            source: e,
        })?;
        for localization in &run.localizations {
            let canvas = render_matches(
                &inputs.reference,
                &inputs.query,
                localization,
                evaluator.config().render_matches,
            );
            let path = render_path(dir, localization.detector);
            save_render(&canvas, &path)?;
            tracing::info!("Match image written to {}", path.display());
        }
    }
    Ok(())
}
