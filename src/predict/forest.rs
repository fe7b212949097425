//! Bagged ensemble of regression trees.

use super::tree::{RegressionTree, TreeParams};
use super::{check_training_data, Regressor};
use crate::error::PredictionError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Random forest hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees (default: 300)
    pub n_estimators: usize,

    /// Growth limits for each tree
    pub tree: TreeParams,

    /// Draw a bootstrap sample per tree; when false every tree sees all rows
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_estimators: 300,
            tree: TreeParams::default(),
            bootstrap: true,
        }
    }
}

/// Random forest regressor; prediction is the mean over trees
#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    seed: u64,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        RandomForest {
            params,
            seed,
            trees: Vec::new(),
        }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictionError> {
        check_training_data("random_forest", features, targets)?;
        if self.params.n_estimators == 0 {
            return Err(PredictionError::FitFailed {
                model: "random_forest".to_string(),
                reason: "n_estimators must be at least 1".to_string(),
            });
        }

        let n = targets.len();
        let all_rows: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        self.trees = (0..self.params.n_estimators)
            .map(|_| {
                let sample: Vec<usize> = if self.params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    all_rows.clone()
                };
                RegressionTree::fit(features, targets, &sample, &self.params.tree)
            })
            .collect();

        Ok(())
    }

    fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return f64::NAN;
        }
        self.trees.iter().map(|tree| tree.predict(row)).mean()
    }
}
