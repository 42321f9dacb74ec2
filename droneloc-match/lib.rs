//! Descriptor matching for drone-to-satellite localization.
//!
//! Float descriptors are matched approximately through a randomized kd-forest,
//! binary descriptors exactly under Hamming distance with cross-check. The
//! hybrid mode runs both and concatenates their truncated results.

pub mod brute_force;
pub mod error;
pub mod kdforest;
pub mod strategy;

pub use brute_force::{hamming, match_brute_force_l2, match_cross_checked};
pub use error::{MatchError, MatchResult};
pub use kdforest::{l2_squared, FlannParams, KdForest};
pub use strategy::{combine_hybrid, ChannelOffset, MatchStrategy, HYBRID_CHANNEL_LIMIT};

#[cfg(test)]
mod tests {
    use super::*;
    use droneloc_core::{DescriptorKind, DescriptorSet, Match};
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn float_rows(n: usize, width: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..width).map(|_| rng.random_range(0.0..1.0)).collect())
            .collect()
    }

    fn binary_rows(n: usize, width: usize, seed: u64) -> Vec<Vec<u8>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n).map(|_| (0..width).map(|_| rng.random()).collect()).collect()
    }

    fn assert_sorted(matches: &[Match]) {
        for pair in matches.windows(2) {
            assert!(pair[0].distance <= pair[1].distance, "{:?} before {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_float_matches_sorted_and_complete() {
        let source = DescriptorSet::Float(float_rows(80, 16, 1));
        let target = DescriptorSet::Float(float_rows(120, 16, 2));
        let matches = MatchStrategy::default().match_descriptors(&source, &target).unwrap();
        // One approximate neighbour per source descriptor.
        assert_eq!(matches.len(), 80);
        assert_sorted(&matches);
        assert!(matches.iter().all(|m| m.target_idx < 120));
    }

    #[test]
    fn test_float_recovers_shuffled_copies() {
        let rows = float_rows(150, 32, 5);
        let permuted: Vec<Vec<f32>> = (0..rows.len()).map(|i| rows[(i * 7) % 150].clone()).collect();
        let matches = MatchStrategy::default()
            .match_descriptors(&DescriptorSet::Float(rows), &DescriptorSet::Float(permuted))
            .unwrap();
        assert_eq!(matches.len(), 150);
        for m in &matches {
            assert_eq!(m.distance, 0.0);
            assert_eq!((m.target_idx * 7) % 150, m.source_idx);
        }
    }

    #[test]
    fn test_binary_matches_sorted() {
        let source = DescriptorSet::Binary(binary_rows(60, 32, 3));
        let target = DescriptorSet::Binary(binary_rows(70, 32, 4));
        let matches = MatchStrategy::default().match_descriptors(&source, &target).unwrap();
        assert!(!matches.is_empty());
        assert!(matches.len() <= 60);
        assert_sorted(&matches);
    }

    #[test]
    fn test_empty_sets_give_no_matches() {
        let strategy = MatchStrategy::default();
        let empty = DescriptorSet::empty(DescriptorKind::Float);
        let some = DescriptorSet::Float(float_rows(5, 4, 9));
        assert!(strategy.match_descriptors(&empty, &some).unwrap().is_empty());
        assert!(strategy.match_descriptors(&some, &empty).unwrap().is_empty());

        // Emptiness wins over a kind mismatch.
        let binary_empty = DescriptorSet::empty(DescriptorKind::Binary);
        assert!(strategy.match_descriptors(&binary_empty, &some).unwrap().is_empty());
    }

    #[test]
    fn test_kind_mismatch() {
        let float = DescriptorSet::Float(float_rows(3, 4, 1));
        let binary = DescriptorSet::Binary(binary_rows(3, 4, 1));
        assert_eq!(
            MatchStrategy::default().match_descriptors(&float, &binary),
            Err(MatchError::KindMismatch {
                source_kind: DescriptorKind::Float,
                target_kind: DescriptorKind::Binary,
            })
        );
    }

    #[test]
    fn test_width_mismatch_between_sets() {
        let source = DescriptorSet::Binary(vec![vec![0; 32]; 3]);
        let target = DescriptorSet::Binary(vec![vec![0; 64]; 3]);
        assert!(matches!(
            MatchStrategy::default().match_descriptors(&source, &target),
            Err(MatchError::DimensionMismatch { index: 0, expected: 32, actual: 64 })
        ));
    }

    #[test]
    fn test_zero_width_rows() {
        let strategy = MatchStrategy::default();
        let float = DescriptorSet::Float(vec![Vec::new(); 3]);
        assert_eq!(strategy.match_descriptors(&float, &float), Err(MatchError::ZeroWidth));
        let binary = DescriptorSet::Binary(vec![Vec::new(); 2]);
        assert_eq!(strategy.match_descriptors(&binary, &binary), Err(MatchError::ZeroWidth));
    }

    #[test]
    fn test_combine_hybrid_truncates_and_keeps_order() {
        let binary: Vec<Match> = (0..150).map(|i| Match::new(i, i, i as f32)).collect();
        let float: Vec<Match> = (0..30).map(|i| Match::new(i, i, 0.01 * i as f32)).collect();
        let offset = ChannelOffset { source: 500, target: 400 };
        let combined = combine_hybrid(binary, float, HYBRID_CHANNEL_LIMIT, offset);

        assert_eq!(combined.len(), 100 + 30);
        assert_sorted(&combined[..100]);
        assert_sorted(&combined[100..]);
        // Float block follows the binary block even though its distances are smaller.
        assert_eq!(combined[99], Match::new(99, 99, 99.0));
        assert_eq!(combined[100], Match::new(500, 400, 0.0));
        assert_eq!(combined[129].source_idx, 529);
    }

    #[test]
    fn test_match_hybrid_with_empty_channel() {
        let strategy = MatchStrategy::default();
        let binary_src = DescriptorSet::Binary(binary_rows(20, 32, 1));
        let binary_dst = DescriptorSet::empty(DescriptorKind::Binary);
        let rows = float_rows(10, 8, 2);
        let float_src = DescriptorSet::Float(rows.clone());
        let float_dst = DescriptorSet::Float(rows);

        let combined = strategy
            .match_hybrid(
                (&binary_src, &binary_dst),
                (&float_src, &float_dst),
                ChannelOffset { source: 20, target: 0 },
            )
            .unwrap();
        assert_eq!(combined.len(), 10);
        assert!(combined.iter().all(|m| m.source_idx >= 20 && m.target_idx < 10));
    }

    proptest! {
        #[test]
        fn prop_float_matches_non_decreasing(n_src in 1usize..40, n_dst in 1usize..40, seed in any::<u64>()) {
            let source = DescriptorSet::Float(float_rows(n_src, 8, seed));
            let target = DescriptorSet::Float(float_rows(n_dst, 8, seed.wrapping_add(1)));
            let matches = MatchStrategy::default().match_descriptors(&source, &target).unwrap();
            prop_assert_eq!(matches.len(), n_src);
            for pair in matches.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
        }

        #[test]
        fn prop_binary_matches_non_decreasing(n_src in 0usize..40, n_dst in 0usize..40, seed in any::<u64>()) {
            let source = DescriptorSet::Binary(binary_rows(n_src, 8, seed));
            let target = DescriptorSet::Binary(binary_rows(n_dst, 8, seed.wrapping_add(1)));
            let matches = MatchStrategy::default().match_descriptors(&source, &target).unwrap();
            prop_assert!(matches.len() <= n_src.min(n_dst));
            for pair in matches.windows(2) {
                prop_assert!(pair[0].distance <= pair[1].distance);
            }
        }

        #[test]
        fn prop_hybrid_length_is_sum_of_truncated(n_bin in 0usize..250, n_float in 0usize..250, limit in 1usize..150) {
            let binary: Vec<Match> = (0..n_bin).map(|i| Match::new(i, i, i as f32)).collect();
            let float: Vec<Match> = (0..n_float).map(|i| Match::new(i, i, i as f32)).collect();
            let combined = combine_hybrid(binary, float, limit, ChannelOffset::default());
            prop_assert_eq!(combined.len(), n_bin.min(limit) + n_float.min(limit));
        }
    }
}
