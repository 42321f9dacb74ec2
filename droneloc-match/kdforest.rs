//! Randomized kd-forest for approximate nearest-neighbour search over float
//! descriptors, in the style of FLANN's `KDTreeIndex`.
//!
//! Every tree splits on a dimension drawn at random among the few with the
//! highest variance, so the trees partition the space differently. A query
//! descends all trees once, then keeps exploring the pending branches that lie
//! closest to it until `checks` leaf points have been compared.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{MatchError, MatchResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of points used to estimate per-dimension mean and variance
const SAMPLE_MEAN: usize = 100;
/// Split dimension is drawn among this many highest-variance dimensions
const RAND_DIM: usize = 5;

/// Index and search parameters of the float matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlannParams {
    /// Number of randomized trees
    pub trees: usize,
    /// Leaf points compared per query before the search may stop
    pub checks: usize,
    /// Seed for the split-dimension draws
    pub seed: u64,
}

impl Default for FlannParams {
    fn default() -> Self {
        Self {
            trees: 5,
            checks: 50,
            seed: 0x5eed_f1a2,
        }
    }
}

impl FlannParams {
    pub fn validate(&self) -> MatchResult<()> {
        if self.trees == 0 {
            return Err(MatchError::InvalidParams("trees must be at least 1".into()));
        }
        if self.checks == 0 {
            return Err(MatchError::InvalidParams("checks must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum KdNode {
    Leaf {
        point: usize,
    },
    Branch {
        dim: usize,
        value: f32,
        left: usize,
        right: usize,
    },
}

#[derive(Debug)]
struct KdTree {
    nodes: Vec<KdNode>,
    root: Option<usize>,
}

/// Pending subtree, ordered so that `BinaryHeap` pops the closest first
#[derive(Debug, Clone, Copy)]
struct PendingBranch {
    dist: f32,
    tree: usize,
    node: usize,
}

impl PartialEq for PendingBranch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingBranch {}

impl PartialOrd for PendingBranch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingBranch {
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist.total_cmp(&self.dist)
    }
}

struct SearchState {
    heap: BinaryHeap<PendingBranch>,
    visited: Vec<bool>,
    checks: usize,
    best: Option<(usize, f32)>,
}

impl SearchState {
    fn best_dist(&self) -> f32 {
        self.best.map_or(f32::INFINITY, |(_, d)| d)
    }
}

/// Forest of randomized kd-trees over borrowed descriptor rows
pub struct KdForest<'a> {
    data: &'a [Vec<f32>],
    trees: Vec<KdTree>,
    checks: usize,
}

impl<'a> KdForest<'a> {
    /// Build the forest. All rows must have the same width.
    pub fn build(data: &'a [Vec<f32>], params: &FlannParams) -> MatchResult<Self> {
        params.validate()?;
        if let Some(first) = data.first() {
            check_widths(data, first.len())?;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let trees = (0..params.trees)
            .map(|_| {
                let mut indices: Vec<usize> = (0..data.len()).collect();
                let mut nodes = Vec::with_capacity(2 * data.len());
                let root = if indices.is_empty() {
                    None
                } else {
                    Some(build_node(data, &mut indices, &mut rng, &mut nodes))
                };
                KdTree { nodes, root }
            })
            .collect();

        Ok(Self {
            data,
            trees,
            checks: params.checks,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Approximate nearest row to `query` as (index, Euclidean distance)
    pub fn nearest(&self, query: &[f32]) -> Option<(usize, f32)> {
        let mut state = SearchState {
            heap: BinaryHeap::new(),
            visited: vec![false; self.data.len()],
            checks: 0,
            best: None,
        };

        for (tree, kd) in self.trees.iter().enumerate() {
            if let Some(root) = kd.root {
                self.descend(tree, root, 0.0, query, &mut state);
            }
        }

        while let Some(branch) = state.heap.pop() {
            if state.checks >= self.checks && state.best.is_some() {
                break;
            }
            if branch.dist >= state.best_dist() {
                continue;
            }
            self.descend(branch.tree, branch.node, branch.dist, query, &mut state);
        }

        state.best.map(|(idx, dist_sq)| (idx, dist_sq.sqrt()))
    }

    fn descend(&self, tree: usize, mut node: usize, mindist: f32, query: &[f32], state: &mut SearchState) {
        let nodes = &self.trees[tree].nodes;
        loop {
            if mindist > state.best_dist() {
                return;
            }
            match nodes[node] {
                KdNode::Leaf { point } => {
                    if state.visited[point] || (state.checks >= self.checks && state.best.is_some()) {
                        return;
                    }
                    state.visited[point] = true;
                    state.checks += 1;
                    let dist = l2_squared(query, &self.data[point]);
                    if dist < state.best_dist() {
                        state.best = Some((point, dist));
                    }
                    return;
                }
                KdNode::Branch {
                    dim,
                    value,
                    left,
                    right,
                } => {
                    let diff = query[dim] - value;
                    let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                    // Distance to a single splitting plane never overestimates.
                    let far_dist = mindist.max(diff * diff);
                    if far_dist < state.best_dist() {
                        state.heap.push(PendingBranch {
                            dist: far_dist,
                            tree,
                            node: far,
                        });
                    }
                    node = near;
                }
            }
        }
    }
}

fn build_node(data: &[Vec<f32>], indices: &mut [usize], rng: &mut ChaCha8Rng, nodes: &mut Vec<KdNode>) -> usize {
    if indices.len() == 1 {
        nodes.push(KdNode::Leaf { point: indices[0] });
        return nodes.len() - 1;
    }

    let (dim, mean) = choose_split(data, indices, rng);
    let mut split = partition(indices, |i| data[i][dim] < mean);
    let mut value = mean;
    if split == 0 || split == indices.len() {
        // All sampled values fell on one side: fall back to a median split.
        split = indices.len() / 2;
        indices.select_nth_unstable_by(split, |&a, &b| data[a][dim].total_cmp(&data[b][dim]));
        value = data[indices[split]][dim];
    }

    let node_idx = nodes.len();
    nodes.push(KdNode::Leaf { point: usize::MAX });

    let (left_indices, right_indices) = indices.split_at_mut(split);
    let left = build_node(data, left_indices, rng, nodes);
    let right = build_node(data, right_indices, rng, nodes);
    nodes[node_idx] = KdNode::Branch {
        dim,
        value,
        left,
        right,
    };
    node_idx
}

fn choose_split(data: &[Vec<f32>], indices: &[usize], rng: &mut ChaCha8Rng) -> (usize, f32) {
    let width = data[indices[0]].len();
    let sample = &indices[..indices.len().min(SAMPLE_MEAN)];
    let count = sample.len() as f32;

    let mut mean = vec![0.0f32; width];
    for &i in sample {
        for (m, v) in mean.iter_mut().zip(&data[i]) {
            *m += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= count);

    let mut var = vec![0.0f32; width];
    for &i in sample {
        for ((s, v), m) in var.iter_mut().zip(&data[i]).zip(&mean) {
            let d = v - m;
            *s += d * d;
        }
    }

    let mut ranked: Vec<usize> = (0..width).collect();
    ranked.sort_by(|&a, &b| var[b].total_cmp(&var[a]));
    let candidates = RAND_DIM.min(width).max(1);
    let dim = ranked[rng.random_range(0..candidates)];
    (dim, mean[dim])
}

/// Move indices satisfying `pred` to the front, returning how many there are
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut store = 0;
    for i in 0..indices.len() {
        if pred(indices[i]) {
            indices.swap(store, i);
            store += 1;
        }
    }
    store
}

pub(crate) fn check_widths<T>(rows: &[Vec<T>], expected: usize) -> MatchResult<()> {
    if expected == 0 && !rows.is_empty() {
        return Err(MatchError::ZeroWidth);
    }
    match rows.iter().position(|row| row.len() != expected) {
        Some(index) => Err(MatchError::DimensionMismatch {
            index,
            expected,
            actual: rows[index].len(),
        }),
        None => Ok(()),
    }
}

/// Squared Euclidean distance
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brute_force::match_brute_force_l2;

    fn random_rows(n: usize, width: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..width).map(|_| rng.random_range(0.0..255.0)).collect())
            .collect()
    }

    #[test]
    fn test_invalid_params() {
        let data = random_rows(4, 8, 1);
        let zero_trees = FlannParams { trees: 0, ..FlannParams::default() };
        assert!(matches!(KdForest::build(&data, &zero_trees), Err(MatchError::InvalidParams(_))));
        let zero_checks = FlannParams { checks: 0, ..FlannParams::default() };
        assert!(matches!(KdForest::build(&data, &zero_checks), Err(MatchError::InvalidParams(_))));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let data = vec![vec![0.0; 8], vec![0.0; 8], vec![0.0; 7]];
        assert!(matches!(
            KdForest::build(&data, &FlannParams::default()),
            Err(MatchError::DimensionMismatch { index: 2, expected: 8, actual: 7 })
        ));
    }

    #[test]
    fn test_zero_width_rows_rejected() {
        let data: Vec<Vec<f32>> = vec![Vec::new(); 3];
        assert!(matches!(
            KdForest::build(&data, &FlannParams::default()),
            Err(MatchError::ZeroWidth)
        ));
    }

    #[test]
    fn test_empty_forest() {
        let data: Vec<Vec<f32>> = Vec::new();
        let forest = KdForest::build(&data, &FlannParams::default()).unwrap();
        assert!(forest.is_empty());
        assert_eq!(forest.nearest(&[1.0, 2.0]), None);
    }

    #[test]
    fn test_single_point() {
        let data = vec![vec![1.0, 2.0, 3.0]];
        let forest = KdForest::build(&data, &FlannParams::default()).unwrap();
        let (idx, dist) = forest.nearest(&[1.0, 2.0, 7.0]).unwrap();
        assert_eq!(idx, 0);
        assert!((dist - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_exact_when_checks_cover_all_points() {
        let targets = random_rows(200, 16, 7);
        let queries = random_rows(60, 16, 8);
        let params = FlannParams { checks: targets.len(), ..FlannParams::default() };
        let forest = KdForest::build(&targets, &params).unwrap();

        let exact = match_brute_force_l2(&queries, &targets);
        for m in exact {
            let (idx, dist) = forest.nearest(&queries[m.source_idx]).unwrap();
            assert_eq!(idx, m.target_idx);
            assert!((dist - m.distance).abs() < 1e-3);
        }
    }

    #[test]
    fn test_finds_identical_rows_with_default_checks() {
        let targets = random_rows(500, 32, 11);
        let forest = KdForest::build(&targets, &FlannParams::default()).unwrap();
        // Rows present in the index sit at distance zero along every tree's path.
        for i in (0..targets.len()).step_by(25) {
            let (idx, dist) = forest.nearest(&targets[i]).unwrap();
            assert_eq!(idx, i);
            assert_eq!(dist, 0.0);
        }
    }

    #[test]
    fn test_duplicate_rows_build() {
        let data = vec![vec![3.0; 4]; 20];
        let forest = KdForest::build(&data, &FlannParams::default()).unwrap();
        let (_, dist) = forest.nearest(&[3.0; 4]).unwrap();
        assert_eq!(dist, 0.0);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let targets = random_rows(300, 8, 3);
        let queries = random_rows(40, 8, 4);
        let params = FlannParams { checks: 8, ..FlannParams::default() };
        let a = KdForest::build(&targets, &params).unwrap();
        let b = KdForest::build(&targets, &params).unwrap();
        for q in &queries {
            assert_eq!(a.nearest(q), b.nearest(q));
        }
    }
}
