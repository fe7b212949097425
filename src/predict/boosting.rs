//! Gradient boosting on squared-error residuals.

use super::tree::{RegressionTree, TreeParams};
use super::{check_training_data, Regressor};
use crate::error::PredictionError;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Gradient boosting hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Boosting rounds (default: 100)
    pub n_estimators: usize,

    /// Shrinkage applied to each tree (default: 0.1)
    pub learning_rate: f64,

    /// Depth of each weak learner (default: 3)
    pub max_depth: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        BoostingParams {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    params: BoostingParams,
    init: Option<f64>,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        GradientBoosting {
            params,
            init: None,
            trees: Vec::new(),
        }
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictionError> {
        check_training_data("gradient_boosting", features, targets)?;
        if !(self.params.learning_rate > 0.0 && self.params.learning_rate.is_finite()) {
            return Err(PredictionError::FitFailed {
                model: "gradient_boosting".to_string(),
                reason: format!("invalid learning rate {}", self.params.learning_rate),
            });
        }

        let init = targets.iter().mean();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            ..TreeParams::default()
        };
        let sample: Vec<usize> = (0..targets.len()).collect();
        let mut current = vec![init; targets.len()];

        self.trees.clear();
        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = targets.iter().zip(&current).map(|(y, f)| y - f).collect();
            if residuals.iter().all(|r| *r == 0.0) {
                break;
            }

            let tree = RegressionTree::fit(features, &residuals, &sample, &tree_params);
            for (value, row) in current.iter_mut().zip(features) {
                *value += self.params.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }

        self.init = Some(init);
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> f64 {
        match self.init {
            None => f64::NAN,
            Some(init) => {
                init + self
                    .trees
                    .iter()
                    .map(|tree| self.params.learning_rate * tree.predict(row))
                    .sum::<f64>()
            }
        }
    }
}
