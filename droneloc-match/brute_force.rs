use droneloc_core::Match;

use crate::kdforest::l2_squared;

/// Number of differing bits
#[inline]
pub fn hamming(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Exact Hamming matching with cross-check.
///
/// `(i, j)` survives only when `j` is the best target for source `i` and `i`
/// is the best source for target `j`. On equal distances the lower index wins
/// in both directions. Output is in source order, unsorted.
pub fn match_cross_checked(source: &[Vec<u8>], target: &[Vec<u8>]) -> Vec<Match> {
    if source.is_empty() || target.is_empty() {
        return Vec::new();
    }

    let mut best_target = vec![(usize::MAX, u32::MAX); source.len()];
    let mut best_source = vec![(usize::MAX, u32::MAX); target.len()];

    for (i, s) in source.iter().enumerate() {
        for (j, t) in target.iter().enumerate() {
            let d = hamming(s, t);
            if d < best_target[i].1 {
                best_target[i] = (j, d);
            }
            if d < best_source[j].1 {
                best_source[j] = (i, d);
            }
        }
    }

    best_target
        .iter()
        .enumerate()
        .filter(|&(i, &(j, _))| best_source[j].0 == i)
        .map(|(i, &(j, d))| Match::new(i, j, d as f32))
        .collect()
}

/// Exact Euclidean nearest neighbour for every source row. Output is in
/// source order, unsorted.
pub fn match_brute_force_l2(source: &[Vec<f32>], target: &[Vec<f32>]) -> Vec<Match> {
    if target.is_empty() {
        return Vec::new();
    }

    source
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let (j, d) = target
                .iter()
                .enumerate()
                .map(|(j, t)| (j, l2_squared(s, t)))
                .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
            Match::new(i, j, d.sqrt())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming() {
        assert_eq!(hamming(&[0b0000_0000], &[0b1111_1111]), 8);
        assert_eq!(hamming(&[0b1010_1010, 0xff], &[0b1010_1010, 0xfe]), 1);
        assert_eq!(hamming(&[7, 7, 7], &[7, 7, 7]), 0);
    }

    #[test]
    fn test_cross_check_keeps_mutual_best() {
        let source = vec![vec![0b0000_0000], vec![0b1111_0000]];
        let target = vec![vec![0b1111_0001], vec![0b0000_0001]];
        let matches = match_cross_checked(&source, &target);
        assert_eq!(matches, vec![Match::new(0, 1, 1.0), Match::new(1, 0, 1.0)]);
    }

    #[test]
    fn test_cross_check_drops_asymmetric_pairs() {
        // Both sources prefer target 0, which prefers source 1.
        let source = vec![vec![0b0000_0011], vec![0b0000_0001]];
        let target = vec![vec![0b0000_0000], vec![0b1111_1111]];
        let matches = match_cross_checked(&source, &target);
        assert_eq!(matches, vec![Match::new(1, 0, 1.0)]);
    }

    #[test]
    fn test_cross_check_ties_prefer_lower_index() {
        let source = vec![vec![0b0000_0000]];
        let target = vec![vec![0b0000_0001], vec![0b0000_0010]];
        let matches = match_cross_checked(&source, &target);
        assert_eq!(matches, vec![Match::new(0, 0, 1.0)]);
    }

    #[test]
    fn test_empty_inputs() {
        let some = vec![vec![1u8, 2, 3]];
        assert!(match_cross_checked(&[], &some).is_empty());
        assert!(match_cross_checked(&some, &[]).is_empty());
        assert!(match_brute_force_l2(&[vec![1.0]], &[]).is_empty());
    }

    #[test]
    fn test_brute_force_l2() {
        let source = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
        let target = vec![vec![9.0, 10.0], vec![0.0, 3.0]];
        let matches = match_brute_force_l2(&source, &target);
        assert_eq!(matches, vec![Match::new(0, 1, 3.0), Match::new(1, 0, 1.0)]);
    }
}
