//! CART regression tree minimising squared error.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Growth limits for a single tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; a depth-0 tree is a single leaf
    pub max_depth: usize,

    /// Minimum samples a node needs before it may split
    pub min_samples_split: usize,

    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

/// A fitted regression tree stored as a node arena
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit on the rows of `features` selected by `sample` (duplicates allowed)
    ///
    /// `sample` must be non-empty.
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        sample: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = RegressionTree { nodes: Vec::new() };
        tree.grow(features, targets, sample.to_vec(), 0, params);
        tree
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf(_)))
            .count()
    }

    fn grow(
        &mut self,
        features: &[Vec<f64>],
        targets: &[f64],
        sample: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let value = sample.iter().map(|&i| targets[i]).mean();
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf(value));

        let first = targets[sample[0]];
        let pure = sample.iter().all(|&i| targets[i] == first);
        if pure || depth >= params.max_depth || sample.len() < params.min_samples_split.max(2) {
            return index;
        }

        let Some(split) = best_split(features, targets, &sample, params) else {
            return index;
        };

        let (left_sample, right_sample): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&i| features[i][split.feature] <= split.threshold);

        let left = self.grow(features, targets, left_sample, depth + 1, params);
        let right = self.grow(features, targets, right_sample, depth + 1, params);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }
}

/// Lowest-SSE split across all features, scanning sorted values with prefix sums
fn best_split(
    features: &[Vec<f64>],
    targets: &[f64],
    sample: &[usize],
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let n = sample.len();
    let min_leaf = params.min_samples_leaf.max(1);
    let feature_count = features.get(sample[0]).map_or(0, Vec::len);

    let total_sum: f64 = sample.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = sample.iter().map(|&i| targets[i] * targets[i]).sum();

    let mut best: Option<SplitCandidate> = None;

    for feature in 0..feature_count {
        let mut order = sample.to_vec();
        order.sort_by(|&a, &b| features[a][feature].total_cmp(&features[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;

        for k in 0..n - 1 {
            let y = targets[order[k]];
            left_sum += y;
            left_sq += y * y;

            let left_n = k + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let lower = features[order[k]][feature];
            let upper = features[order[k + 1]][feature];
            if lower >= upper {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);

            if best.map_or(true, |b| sse < b.sse) {
                let mut threshold = lower / 2.0 + upper / 2.0;
                if threshold >= upper {
                    threshold = lower;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    sse,
                });
            }
        }
    }

    best
}
