use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::DescriptorKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Detector families the feature capability must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetectorFamily {
    Sift,
    Orb,
    Akaze,
    Brisk,
}

impl DetectorFamily {
    pub const ALL: [DetectorFamily; 4] = [
        DetectorFamily::Sift,
        DetectorFamily::Orb,
        DetectorFamily::Akaze,
        DetectorFamily::Brisk,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DetectorFamily::Sift => "sift",
            DetectorFamily::Orb => "orb",
            DetectorFamily::Akaze => "akaze",
            DetectorFamily::Brisk => "brisk",
        }
    }

    /// Descriptor kind this family is matched as
    pub fn descriptor_kind(self) -> DescriptorKind {
        match self {
            DetectorFamily::Sift | DetectorFamily::Akaze => DescriptorKind::Float,
            DetectorFamily::Orb | DetectorFamily::Brisk => DescriptorKind::Binary,
        }
    }
}

impl fmt::Display for DetectorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorFamily {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        DetectorFamily::ALL
            .into_iter()
            .find(|family| family.name() == name)
            .ok_or_else(|| CoreError::UnsupportedDetector(s.to_string()))
    }
}

/// Which extractor/matcher combination a localization call runs.
///
/// `Hybrid` runs ORB (binary channel) and SIFT (float channel) on both images
/// and concatenates the two truncated match lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum DetectorConfig {
    Single(DetectorFamily),
    Hybrid,
}

impl DetectorConfig {
    pub const HYBRID_BINARY_FAMILY: DetectorFamily = DetectorFamily::Orb;
    pub const HYBRID_FLOAT_FAMILY: DetectorFamily = DetectorFamily::Sift;

    /// The roster evaluated when nothing else is configured
    pub fn default_roster() -> Vec<DetectorConfig> {
        DetectorFamily::ALL
            .into_iter()
            .map(DetectorConfig::Single)
            .chain(std::iter::once(DetectorConfig::Hybrid))
            .collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            DetectorConfig::Single(family) => family.name(),
            DetectorConfig::Hybrid => "hfm",
        }
    }

    /// Families whose features have to be extracted for this configuration
    pub fn families(&self) -> Vec<DetectorFamily> {
        match self {
            DetectorConfig::Single(family) => vec![*family],
            DetectorConfig::Hybrid => vec![Self::HYBRID_BINARY_FAMILY, Self::HYBRID_FLOAT_FAMILY],
        }
    }
}

impl fmt::Display for DetectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DetectorConfig {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hfm" | "hybrid" => Ok(DetectorConfig::Hybrid),
            _ => s.parse().map(DetectorConfig::Single),
        }
    }
}

impl TryFrom<String> for DetectorConfig {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DetectorConfig> for String {
    fn from(value: DetectorConfig) -> Self {
        value.label().to_string()
    }
}
