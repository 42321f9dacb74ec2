use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::detector::DetectorFamily;
use crate::error::{CoreError, CoreResult};
use crate::types::{Features, Image};

/// Capability that turns an image into keypoints + descriptors for a family.
///
/// Implementations take `&self`: anything cached between calls must be
/// read-only, since one backend is shared by concurrent localization calls.
pub trait FeatureBackend: Send + Sync {
    fn detect_and_compute(&self, family: DetectorFamily, image: &Image) -> CoreResult<Features>;
}

impl<B: FeatureBackend + ?Sized> FeatureBackend for &B {
    fn detect_and_compute(&self, family: DetectorFamily, image: &Image) -> CoreResult<Features> {
        (**self).detect_and_compute(family, image)
    }
}

/// A backend bound to one detector family
pub struct FeatureExtractor<'a> {
    backend: &'a dyn FeatureBackend,
    family: DetectorFamily,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(backend: &'a dyn FeatureBackend, family: DetectorFamily) -> Self {
        Self { backend, family }
    }

    pub fn family(&self) -> DetectorFamily {
        self.family
    }

    /// Detect and describe, rejecting descriptors of the wrong kind
    pub fn extract(&self, image: &Image) -> CoreResult<Features> {
        let features = self.backend.detect_and_compute(self.family, image)?;
        let expected = self.family.descriptor_kind();
        if features.kind() != expected {
            return Err(CoreError::DescriptorKindMismatch {
                family: self.family,
                expected,
                actual: features.kind(),
            });
        }
        Ok(features)
    }
}

/// Content digest used to look images up without holding on to them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageKey(u64);

impl ImageKey {
    pub fn of(image: &Image) -> Self {
        let mut hasher = DefaultHasher::new();
        image.dimensions().hash(&mut hasher);
        image.data().hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Backend serving features computed ahead of time by an external detector
#[derive(Debug, Clone, Default)]
pub struct PrecomputedFeatures {
    entries: HashMap<(ImageKey, DetectorFamily), Features>,
}

impl PrecomputedFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: &Image, family: DetectorFamily, features: Features) {
        self.entries.insert((ImageKey::of(image), family), features);
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with(mut self, image: &Image, family: DetectorFamily, features: Features) -> Self {
        self.insert(image, family, features);
        self
    }

    pub fn contains(&self, image: &Image, family: DetectorFamily) -> bool {
        self.entries.contains_key(&(ImageKey::of(image), family))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FeatureBackend for PrecomputedFeatures {
    fn detect_and_compute(&self, family: DetectorFamily, image: &Image) -> CoreResult<Features> {
        self.entries
            .get(&(ImageKey::of(image), family))
            .cloned()
            .ok_or_else(|| CoreError::Backend {
                family,
                message: format!(
                    "no precomputed features for {}x{} image",
                    image.width(),
                    image.height()
                ),
            })
    }
}
