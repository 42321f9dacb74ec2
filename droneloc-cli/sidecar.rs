//! JSON feature files produced by an external detector, one per image and
//! family: `<dir>/<image stem>.<family>.json`.

use std::path::{Path, PathBuf};

use droneloc_core::{DescriptorSet, DetectorFamily, Features, Image, Keypoint, PrecomputedFeatures};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FeatureFile {
    keypoints: Vec<Keypoint>,
    descriptors: DescriptorSet,
}

pub fn sidecar_path(dir: &Path, image_path: &Path, family: DetectorFamily) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{stem}.{family}.json"))
}

pub fn read_features(path: &Path) -> HarnessResult<Features> {
    let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let file: FeatureFile = serde_json::from_str(&content)?;
    Ok(Features::new(file.keypoints, file.descriptors)?)
}

pub fn write_features(path: &Path, features: &Features) -> HarnessResult<()> {
    let file = FeatureFile {
        keypoints: features.keypoints().to_vec(),
        descriptors: features.descriptors().clone(),
    };
    let json = serde_json::to_string(&file)?;
    std::fs::write(path, json).map_err(|e| HarnessError::io(path, e))
}

/// Load every available sidecar for `images` and `families`.
///
/// Missing files are skipped, so the detector that needs them fails later
/// with a backend error instead of aborting the whole run.
pub fn load_precomputed(
    dir: &Path,
    images: &[(&Path, &Image)],
    families: &[DetectorFamily],
) -> HarnessResult<PrecomputedFeatures> {
    let mut features = PrecomputedFeatures::new();
    for &(image_path, image) in images {
        for &family in families {
            let path = sidecar_path(dir, image_path, family);
            if !path.is_file() {
                debug!(path = %path.display(), "no feature sidecar");
                continue;
            }
            let loaded = read_features(&path)?;
            debug!(path = %path.display(), keypoints = loaded.len(), "loaded features");
            features.insert(image, family, loaded);
        }
    }
    Ok(features)
}
