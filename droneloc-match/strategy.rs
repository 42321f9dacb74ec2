use droneloc_core::{sort_by_distance, DescriptorSet, Match};

use crate::brute_force::match_cross_checked;
use crate::error::{MatchError, MatchResult};
use crate::kdforest::{check_widths, FlannParams, KdForest};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Matches kept per channel before the hybrid lists are concatenated
pub const HYBRID_CHANNEL_LIMIT: usize = 100;

/// Index shift applied to float-channel matches in hybrid mode, equal to the
/// number of binary-channel keypoints preceding them in each image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelOffset {
    pub source: usize,
    pub target: usize,
}

/// Chooses the matcher from the descriptor kind and keeps the output sorted
/// by ascending distance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatchStrategy {
    pub hybrid_limit: usize,
    pub flann: FlannParams,
}

impl Default for MatchStrategy {
    fn default() -> Self {
        Self {
            hybrid_limit: HYBRID_CHANNEL_LIMIT,
            flann: FlannParams::default(),
        }
    }
}

impl MatchStrategy {
    pub fn new(flann: FlannParams) -> Self {
        Self {
            flann,
            ..Self::default()
        }
    }

    pub fn with_hybrid_limit(mut self, limit: usize) -> Self {
        self.hybrid_limit = limit;
        self
    }

    /// Match every source descriptor against the target set.
    ///
    /// Float descriptors go through the kd-forest, binary descriptors through
    /// cross-checked Hamming matching. An empty side yields no matches.
    pub fn match_descriptors(&self, source: &DescriptorSet, target: &DescriptorSet) -> MatchResult<Vec<Match>> {
        if source.is_empty() || target.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = match (source, target) {
            (DescriptorSet::Float(src), DescriptorSet::Float(dst)) => {
                check_widths(dst, src[0].len())?;
                check_widths(src, src[0].len())?;
                let forest = KdForest::build(dst, &self.flann)?;
                src.iter()
                    .enumerate()
                    .filter_map(|(i, row)| forest.nearest(row).map(|(j, d)| Match::new(i, j, d)))
                    .collect()
            }
            (DescriptorSet::Binary(src), DescriptorSet::Binary(dst)) => {
                check_widths(dst, src[0].len())?;
                check_widths(src, src[0].len())?;
                match_cross_checked(src, dst)
            }
            _ => {
                return Err(MatchError::KindMismatch {
                    source_kind: source.kind(),
                    target_kind: target.kind(),
                });
            }
        };

        sort_by_distance(&mut matches);
        Ok(matches)
    }

    /// Match both hybrid channels and concatenate their best matches.
    pub fn match_hybrid(
        &self,
        binary: (&DescriptorSet, &DescriptorSet),
        float: (&DescriptorSet, &DescriptorSet),
        float_offset: ChannelOffset,
    ) -> MatchResult<Vec<Match>> {
        let binary_matches = self.match_descriptors(binary.0, binary.1)?;
        let float_matches = self.match_descriptors(float.0, float.1)?;
        Ok(combine_hybrid(binary_matches, float_matches, self.hybrid_limit, float_offset))
    }
}

/// Truncate each (already sorted) channel to `limit` and concatenate them,
/// binary first. The result is not re-sorted: distances of the two channels
/// live on different scales.
pub fn combine_hybrid(
    mut binary: Vec<Match>,
    mut float: Vec<Match>,
    limit: usize,
    float_offset: ChannelOffset,
) -> Vec<Match> {
    binary.truncate(limit);
    float.truncate(limit);
    binary.extend(float.into_iter().map(|m| Match {
        source_idx: m.source_idx + float_offset.source,
        target_idx: m.target_idx + float_offset.target,
        distance: m.distance,
    }));
    binary
}
