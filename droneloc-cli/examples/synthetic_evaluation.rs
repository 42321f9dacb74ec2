use droneloc::droneloc_core::{DescriptorKind, DescriptorSet};
use droneloc::{
    DetectorConfig, DetectorFamily, EvaluationConfig, Evaluator, Features, Image, Keypoint, PrecomputedFeatures,
    RefinementScope, TracingObserver,
};

/// Keypoints of a 100x80 drone window placed at (120, 90) in a 400x300
/// satellite image, plus a few wrong correspondences per family.
fn scene() -> Result<(Image, Image, PrecomputedFeatures), Box<dyn std::error::Error>> {
    let reference = Image::filled(400, 300, 90)?;
    let query = Image::filled(100, 80, 160)?;
    let n = 60;

    let query_kps: Vec<Keypoint> = (0..n)
        .map(|i| Keypoint::new(3.0 + (i % 12) as f32 * 8.0, 4.0 + (i / 12) as f32 * 14.0 + (i % 4) as f32))
        .collect();
    let mut reference_kps: Vec<Keypoint> = query_kps
        .iter()
        .map(|kp| Keypoint::new(kp.x + 120.0, kp.y + 90.0))
        .collect();
    // Outliers RANSAC has to reject
    for (i, kp) in reference_kps.iter_mut().enumerate().filter(|(i, _)| i % 10 == 7) {
        kp.x = 390.0 - i as f32 * 3.0;
        kp.y = 10.0 + i as f32 * 2.0;
    }

    let mut backend = PrecomputedFeatures::new();
    for family in DetectorFamily::ALL {
        let descriptors = || match family.descriptor_kind() {
            DescriptorKind::Float => DescriptorSet::Float(
                (0..n)
                    .map(|i| (0..32).map(|k| ((i * 7 + k * 3) % 97) as f32 + i as f32).collect())
                    .collect(),
            ),
            DescriptorKind::Binary => DescriptorSet::Binary(
                (0..n)
                    .map(|i| (0..32).map(|k| (i * 37 + k * 13) as u8).collect())
                    .collect(),
            ),
        };
        backend.insert(&reference, family, Features::new(reference_kps.clone(), descriptors())?);
        backend.insert(&query, family, Features::new(query_kps.clone(), descriptors())?);
    }
    Ok((reference, query, backend))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    println!("🛰  Drone Localization Evaluation Demo");
    println!("======================================\n");

    let (reference, query, backend) = scene()?;
    println!("📷 Reference {}x{}, query {}x{}", reference.width(), reference.height(), query.width(), query.height());

    // Config round trip through TOML, the format the CLI reads
    let mut config = EvaluationConfig::default()
        .with_detectors(DetectorConfig::default_roster())
        .with_expected_position(170.0, 130.0)
        .with_threads(2);
    config.estimator.scope = RefinementScope::Inliers;

    let path = std::env::temp_dir().join("droneloc_demo_config.toml");
    config.save(&path)?;
    let loaded = EvaluationConfig::load(&path)?;
    println!("📋 Loaded {}", path.display());
    println!("   {}\n", loaded.summary());

    let evaluator = Evaluator::new(backend, loaded)?;
    let run = evaluator.evaluate(&reference, &query, &TracingObserver);

    print!("{}", run.report.summary_table());
    if let Some(best) = run.report.best() {
        println!("\n🏆 Best: {} ({:.3} px off)", best.detector, best.position_error);
    }

    std::fs::remove_file(&path)?;
    Ok(())
}
