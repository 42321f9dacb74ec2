use crate::error::{CoreError, CoreResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit grayscale image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Image {
    /// Wrap a raw buffer, checking it against the dimensions
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> CoreResult<Self> {
        let expected_len = width * height;
        if width == 0 || height == 0 || data.len() != expected_len {
            return Err(CoreError::InvalidImageData {
                width,
                height,
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Uniform image, mostly useful when only the dimensions matter
    pub fn filled(width: usize, height: usize, value: u8) -> CoreResult<Self> {
        Self::new(width, height, vec![value; width * height])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Center in the image's own pixel frame: (width / 2, height / 2)
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

/// Detected interest point. Only `x`/`y` matter to the localization pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub size: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub angle: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub response: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            size: 0.0,
            angle: 0.0,
            response: 0.0,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DescriptorKind {
    /// Compared by Euclidean distance, matched approximately
    Float,
    /// Compared by Hamming distance, matched exactly with cross-check
    Binary,
}

impl std::fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptorKind::Float => write!(f, "float"),
            DescriptorKind::Binary => write!(f, "binary"),
        }
    }
}

/// One descriptor row per keypoint; the variant is the kind tag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "rows", rename_all = "lowercase"))]
pub enum DescriptorSet {
    Float(Vec<Vec<f32>>),
    Binary(Vec<Vec<u8>>),
}

impl DescriptorSet {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            DescriptorSet::Float(_) => DescriptorKind::Float,
            DescriptorSet::Binary(_) => DescriptorKind::Binary,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DescriptorSet::Float(rows) => rows.len(),
            DescriptorSet::Binary(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn empty(kind: DescriptorKind) -> Self {
        match kind {
            DescriptorKind::Float => DescriptorSet::Float(Vec::new()),
            DescriptorKind::Binary => DescriptorSet::Binary(Vec::new()),
        }
    }
}

/// Keypoints and their descriptors. Index `i` of one belongs to index `i` of
/// the other, so the two are only ever built and taken apart together.
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    keypoints: Vec<Keypoint>,
    descriptors: DescriptorSet,
}

impl Features {
    pub fn new(keypoints: Vec<Keypoint>, descriptors: DescriptorSet) -> CoreResult<Self> {
        if keypoints.len() != descriptors.len() {
            return Err(CoreError::FeatureCountMismatch {
                keypoints: keypoints.len(),
                descriptors: descriptors.len(),
            });
        }
        Ok(Self {
            keypoints,
            descriptors,
        })
    }

    pub fn empty(kind: DescriptorKind) -> Self {
        Self {
            keypoints: Vec::new(),
            descriptors: DescriptorSet::empty(kind),
        }
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }

    pub fn kind(&self) -> DescriptorKind {
        self.descriptors.kind()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Keypoint>, DescriptorSet) {
        (self.keypoints, self.descriptors)
    }
}

/// Correspondence between a source keypoint and a target keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub source_idx: usize,
    pub target_idx: usize,
    pub distance: f32,
}

impl Match {
    pub fn new(source_idx: usize, target_idx: usize, distance: f32) -> Self {
        Self {
            source_idx,
            target_idx,
            distance,
        }
    }
}

/// Sort ascending by distance. Stable, so equal distances keep their order.
pub fn sort_by_distance(matches: &mut [Match]) {
    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// Estimated position of the query image center in the reference frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
}

impl PositionEstimate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImageRole {
    Reference,
    Query,
}

impl std::fmt::Display for ImageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageRole::Reference => write!(f, "reference"),
            ImageRole::Query => write!(f, "query"),
        }
    }
}
