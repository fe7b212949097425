//! Ridge-stabilised least squares on standardised features.

use super::{check_training_data, Regressor};
use crate::error::PredictionError;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Linear model hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    /// L2 penalty added to the normal equations (default: 1e-6)
    pub ridge: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        LinearParams { ridge: 1e-6 }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Fitted {
    means: Vec<f64>,
    scales: Vec<f64>,
    coefficients: Vec<f64>,
    intercept: f64,
}

/// Ordinary least squares with a small ridge term
///
/// Constant columns get a zero coefficient, so a training set of identical rows
/// predicts the mean target.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    params: LinearParams,
    fitted: Option<Fitted>,
}

impl LinearRegression {
    pub fn new(params: LinearParams) -> Self {
        LinearRegression {
            params,
            fitted: None,
        }
    }

    /// Fitted coefficients in standardised feature space
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.coefficients.as_slice())
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictionError> {
        let width = check_training_data("linear", features, targets)?;

        let means: Vec<f64> = (0..width)
            .map(|j| features.iter().map(|row| row[j]).mean())
            .collect();
        let scales: Vec<f64> = (0..width)
            .map(|j| {
                let sd = features.iter().map(|row| row[j]).population_std_dev();
                if sd.is_finite() && sd > 0.0 {
                    sd
                } else {
                    1.0
                }
            })
            .collect();

        let intercept = targets.iter().mean();
        let standardised: Vec<Vec<f64>> = features
            .iter()
            .map(|row| standardise(row, &means, &scales))
            .collect();

        // Normal equations: (ZᵀZ + λI) β = Zᵀ(y - ȳ)
        let mut gram = vec![vec![0.0; width]; width];
        let mut moment = vec![0.0; width];
        for (row, target) in standardised.iter().zip(targets) {
            let centred = target - intercept;
            for a in 0..width {
                moment[a] += row[a] * centred;
                for b in 0..width {
                    gram[a][b] += row[a] * row[b];
                }
            }
        }
        for (a, row) in gram.iter_mut().enumerate() {
            row[a] += self.params.ridge;
        }

        let coefficients = solve(gram, moment).ok_or_else(|| PredictionError::FitFailed {
            model: "linear".to_string(),
            reason: "normal equations are singular".to_string(),
        })?;

        self.fitted = Some(Fitted {
            means,
            scales,
            coefficients,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> f64 {
        match &self.fitted {
            None => f64::NAN,
            Some(fitted) => {
                let z = standardise(row, &fitted.means, &fitted.scales);
                fitted.intercept
                    + z.iter()
                        .zip(&fitted.coefficients)
                        .map(|(value, beta)| value * beta)
                        .sum::<f64>()
            }
        }
    }
}

fn standardise(row: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means.iter().zip(scales))
        .map(|(value, (mean, scale))| (value - mean) / scale)
        .collect()
}

/// Gaussian elimination with partial pivoting
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();

    for col in 0..n {
        let pivot =
            (col..n).max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))?;
        if matrix[pivot][col].abs() < f64::MIN_POSITIVE {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Some(solution)
}
