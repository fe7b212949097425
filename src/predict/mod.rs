//! 10K performance prediction
//!
//! Trains regression models on historical sessions in the target distance class and
//! forecasts the next completion time, with mean absolute error measured on a seeded
//! holdout partition. All model families share one [`Regressor`] interface so the
//! same split can be used for side-by-side comparison.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod tree;

use crate::error::{CalculationError, PredictionError};
use crate::features::{FeatureBuilder, FeatureRow, FeatureSet};
use crate::models::{format_minutes, Session};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use linear::{LinearParams, LinearRegression};
pub use tree::{RegressionTree, TreeParams};

/// A regression model mapping feature vectors to a target value
pub trait Regressor {
    /// Fit on row-aligned features and targets, replacing any previous fit
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), PredictionError>;

    /// Predict one row; NaN before a successful fit
    fn predict(&self, row: &[f64]) -> f64;
}

/// Shared shape checks; returns the feature width
pub(crate) fn check_training_data(
    model: &str,
    features: &[Vec<f64>],
    targets: &[f64],
) -> Result<usize, PredictionError> {
    let fail = |reason: String| PredictionError::FitFailed {
        model: model.to_string(),
        reason,
    };

    if targets.is_empty() {
        return Err(fail("no training rows".to_string()));
    }
    if features.len() != targets.len() {
        return Err(fail(format!(
            "{} feature rows but {} targets",
            features.len(),
            targets.len()
        )));
    }

    let width = features[0].len();
    if features.iter().any(|row| row.len() != width) {
        return Err(fail("feature rows have different widths".to_string()));
    }
    if features.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
        return Err(fail("non-finite training value".to_string()));
    }

    Ok(width)
}

/// A single regression family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Linear,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModelKind::Linear => "Linear Regression",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
        };
        write!(f, "{}", label)
    }
}

/// Which families a prediction run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Linear,
    RandomForest,
    GradientBoosting,
    /// Every family, in declaration order
    All,
}

impl ModelFamily {
    pub fn kinds(&self) -> Vec<ModelKind> {
        match self {
            ModelFamily::Linear => vec![ModelKind::Linear],
            ModelFamily::RandomForest => vec![ModelKind::RandomForest],
            ModelFamily::GradientBoosting => vec![ModelKind::GradientBoosting],
            ModelFamily::All => vec![
                ModelKind::Linear,
                ModelKind::RandomForest,
                ModelKind::GradientBoosting,
            ],
        }
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "linear" => Ok(ModelFamily::Linear),
            "random_forest" | "forest" | "rf" => Ok(ModelFamily::RandomForest),
            "gradient_boosting" | "boosting" | "gb" => Ok(ModelFamily::GradientBoosting),
            "all" => Ok(ModelFamily::All),
            other => Err(format!("Unknown model family: {}", other)),
        }
    }
}

/// Prediction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Distance being forecast, km (default: 10.0)
    pub target_distance_km: f64,

    /// Inclusive tolerance around the target distance, km (default: 0.2)
    pub tolerance_km: f64,

    /// Minimum qualifying sessions (default: 5)
    pub min_sessions: usize,

    /// Share of qualifying sessions held out for MAE (default: 0.25)
    pub holdout_fraction: f64,

    /// Seed for the split and bootstrap sampling (default: 42)
    pub seed: u64,

    pub model_family: ModelFamily,
    pub feature_set: FeatureSet,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    pub linear: LinearParams,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            target_distance_km: 10.0,
            tolerance_km: 0.2,
            min_sessions: 5,
            holdout_fraction: 0.25,
            seed: 42,
            model_family: ModelFamily::RandomForest,
            feature_set: FeatureSet::Standard,
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            linear: LinearParams::default(),
        }
    }
}

impl PredictionConfig {
    pub fn validate(&self) -> Result<(), CalculationError> {
        let invalid = |parameter: &str, value: String| CalculationError::InvalidParameter {
            calculation: "prediction".to_string(),
            parameter: parameter.to_string(),
            value,
        };

        if !(self.target_distance_km > 0.0 && self.target_distance_km.is_finite()) {
            return Err(invalid("target_distance_km", self.target_distance_km.to_string()));
        }
        if !(self.tolerance_km >= 0.0 && self.tolerance_km.is_finite()) {
            return Err(invalid("tolerance_km", self.tolerance_km.to_string()));
        }
        if self.min_sessions < 2 {
            return Err(invalid("min_sessions", self.min_sessions.to_string()));
        }
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(invalid("holdout_fraction", self.holdout_fraction.to_string()));
        }
        if self.forest.n_estimators == 0 {
            return Err(invalid("forest.n_estimators", "0".to_string()));
        }
        if !(self.boosting.learning_rate > 0.0 && self.boosting.learning_rate.is_finite()) {
            return Err(invalid(
                "boosting.learning_rate",
                self.boosting.learning_rate.to_string(),
            ));
        }
        Ok(())
    }

    fn accepts_distance(&self, distance_km: f64) -> bool {
        (distance_km - self.target_distance_km).abs() <= self.tolerance_km
    }
}

/// Forecast for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub model: ModelKind,
    pub predicted_minutes: f64,
    pub mean_absolute_error: f64,

    /// Qualifying sessions used for the run (training plus holdout)
    pub training_sample_count: usize,

    /// Sessions held out for the error estimate
    pub holdout_sample_count: usize,
}

impl PredictionResult {
    /// Predicted time as `M:SS`
    pub fn formatted_time(&self) -> String {
        format_minutes(self.predicted_minutes)
    }
}

/// Seeded partition of `0..n` into (training, holdout), both ascending
///
/// The holdout takes `ceil(fraction × n)` rows, clamped so both sides are non-empty
/// whenever `n ≥ 2`.
pub fn holdout_split(n: usize, fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let wanted = (fraction * n as f64).ceil() as usize;
    let holdout_len = if n < 2 { n } else { wanted.clamp(1, n - 1) };

    let mut holdout = order[..holdout_len].to_vec();
    let mut train = order[holdout_len..].to_vec();
    holdout.sort_unstable();
    train.sort_unstable();
    (train, holdout)
}

struct PreparedData {
    features: Vec<Vec<f64>>,
    targets: Vec<f64>,
    train: Vec<usize>,
    holdout: Vec<usize>,
    next: Vec<f64>,
}

impl PreparedData {
    fn subset(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        indices
            .iter()
            .map(|&i| (self.features[i].clone(), self.targets[i]))
            .unzip()
    }
}

/// Performance predictor
#[derive(Debug, Clone)]
pub struct PerformancePredictor {
    config: PredictionConfig,
}

impl PerformancePredictor {
    pub fn new() -> Self {
        Self {
            config: PredictionConfig::default(),
        }
    }

    pub fn with_config(config: PredictionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Rows in the target distance class with every required feature present
    pub fn qualifying_rows<'a>(&self, rows: &'a [FeatureRow]) -> Vec<&'a FeatureRow> {
        rows.iter()
            .filter(|row| self.config.accepts_distance(row.session.distance_km()))
            .filter(|row| row.vector(self.config.feature_set).is_some())
            .collect()
    }

    /// Predict with the configured model family
    ///
    /// `All` resolves to the random forest; use [`Self::compare_models`] for every family.
    pub fn predict(&self, rows: &[FeatureRow]) -> Result<PredictionResult, PredictionError> {
        let kind = match self.config.model_family {
            ModelFamily::Linear => ModelKind::Linear,
            ModelFamily::GradientBoosting => ModelKind::GradientBoosting,
            ModelFamily::RandomForest | ModelFamily::All => ModelKind::RandomForest,
        };
        self.predict_with(kind, rows)
    }

    /// Predict with one specific model
    pub fn predict_with(
        &self,
        kind: ModelKind,
        rows: &[FeatureRow],
    ) -> Result<PredictionResult, PredictionError> {
        let data = self.prepare(rows)?;
        self.evaluate(kind, &data)
    }

    /// One result per family in the configured set, same split for each
    pub fn compare_models(
        &self,
        rows: &[FeatureRow],
    ) -> Result<Vec<PredictionResult>, PredictionError> {
        let data = self.prepare(rows)?;
        self.config
            .model_family
            .kinds()
            .into_iter()
            .map(|kind| self.evaluate(kind, &data))
            .collect()
    }

    /// Build features from sessions and predict with the configured family
    pub fn run(&self, sessions: &[Session]) -> Result<PredictionResult, PredictionError> {
        let rows = FeatureBuilder::new().build(sessions);
        self.predict(&rows)
    }

    fn prepare(&self, rows: &[FeatureRow]) -> Result<PreparedData, PredictionError> {
        let set = self.config.feature_set;
        let qualifying = self.qualifying_rows(rows);

        if qualifying.len() < self.config.min_sessions {
            return Err(PredictionError::InsufficientData {
                qualifying: qualifying.len(),
                required: self.config.min_sessions,
            });
        }

        let (features, targets): (Vec<Vec<f64>>, Vec<f64>) = qualifying
            .iter()
            .filter_map(|row| {
                row.vector(set)
                    .map(|vector| (vector, row.session.duration_minutes()))
            })
            .unzip();

        let next = self
            .next_vector(rows)
            .ok_or(PredictionError::InsufficientData {
                qualifying: 0,
                required: self.config.min_sessions,
            })?;

        let (train, holdout) =
            holdout_split(targets.len(), self.config.holdout_fraction, self.config.seed);

        debug!(
            qualifying = targets.len(),
            train = train.len(),
            holdout = holdout.len(),
            "Prepared prediction data"
        );

        Ok(PreparedData {
            features,
            targets,
            train,
            holdout,
            next,
        })
    }

    /// Input vector for the next run at the target distance
    ///
    /// Pace and heart rate come from the latest complete session. Trailing
    /// mileage comes from the latest session of any kind, since a run without
    /// heart rate still counts toward recent volume.
    fn next_vector(&self, rows: &[FeatureRow]) -> Option<Vec<f64>> {
        let latest_complete = rows
            .iter()
            .filter(|row| row.is_complete())
            .max_by_key(|row| row.session.timestamp())?;
        let latest = rows.iter().max_by_key(|row| row.session.timestamp())?;

        latest_complete.vector_with(
            self.config.feature_set,
            self.config.target_distance_km,
            latest.trailing_7d_km,
        )
    }

    fn build_model(&self, kind: ModelKind) -> Box<dyn Regressor> {
        match kind {
            ModelKind::Linear => Box::new(LinearRegression::new(self.config.linear.clone())),
            ModelKind::RandomForest => {
                Box::new(RandomForest::new(self.config.forest.clone(), self.config.seed))
            }
            ModelKind::GradientBoosting => {
                Box::new(GradientBoosting::new(self.config.boosting.clone()))
            }
        }
    }

    fn evaluate(
        &self,
        kind: ModelKind,
        data: &PreparedData,
    ) -> Result<PredictionResult, PredictionError> {
        let (train_x, train_y) = data.subset(&data.train);
        let (holdout_x, holdout_y) = data.subset(&data.holdout);

        let mut model = self.build_model(kind);
        model.fit(&train_x, &train_y)?;

        let mean_absolute_error = holdout_x
            .iter()
            .zip(&holdout_y)
            .map(|(row, actual)| (model.predict(row) - actual).abs())
            .mean();
        let predicted_minutes = model.predict(&data.next);

        if !predicted_minutes.is_finite() {
            return Err(PredictionError::FitFailed {
                model: kind.name().to_string(),
                reason: "prediction is not finite".to_string(),
            });
        }

        info!(
            model = kind.name(),
            predicted = %format_minutes(predicted_minutes),
            mae = mean_absolute_error,
            samples = data.targets.len(),
            "Fitted prediction model"
        );

        Ok(PredictionResult {
            model: kind,
            predicted_minutes,
            mean_absolute_error,
            training_sample_count: data.targets.len(),
            holdout_sample_count: data.holdout.len(),
        })
    }
}

impl Default for PerformancePredictor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap()
            + Duration::days(offset)
    }

    /// Ten-kilometre runs eight days apart so trailing mileage stays at 10 km
    fn identical_runs(count: i64) -> Vec<Session> {
        (0..count)
            .map(|i| Session::new(day(i * 8), 10_000.0, 3_000.0, Some(150.0)))
            .collect()
    }

    fn varied_runs() -> Vec<Session> {
        (0..12)
            .map(|i| {
                let seconds = 2_700.0 + f64::from(i * 37 % 11) * 30.0;
                let hr = 140.0 + f64::from(i * 5 % 7) * 3.0;
                Session::new(day(i64::from(i) * 3), 10_000.0, seconds, Some(hr))
            })
            .collect()
    }

    fn small_config() -> PredictionConfig {
        PredictionConfig {
            forest: ForestParams {
                n_estimators: 30,
                ..ForestParams::default()
            },
            ..PredictionConfig::default()
        }
    }

    #[test]
    fn test_insufficient_data_is_typed() {
        let predictor = PerformancePredictor::new();
        let result = predictor.run(&identical_runs(4));

        match result {
            Err(PredictionError::InsufficientData {
                qualifying,
                required,
            }) => {
                assert_eq!(qualifying, 4);
                assert_eq!(required, 5);
            }
            other => panic!("expected insufficient data, got {:?}", other),
        }
    }

    #[test]
    fn test_identical_sessions_predict_shared_duration() {
        let predictor = PerformancePredictor::with_config(small_config());
        let result = predictor.run(&identical_runs(5)).unwrap();

        assert_eq!(result.predicted_minutes, 50.0);
        assert_eq!(result.mean_absolute_error, 0.0);
        assert_eq!(result.training_sample_count, 5);
        assert_eq!(result.holdout_sample_count, 2);
        assert_eq!(result.formatted_time(), "50:00");
    }

    #[test]
    fn test_every_family_is_exact_on_identical_sessions() {
        let config = PredictionConfig {
            model_family: ModelFamily::All,
            feature_set: FeatureSet::WithDistance,
            ..small_config()
        };
        let rows = FeatureBuilder::new().build(&identical_runs(5));
        let results = PerformancePredictor::with_config(config)
            .compare_models(&rows)
            .unwrap();

        for result in &results {
            assert_eq!(result.predicted_minutes, 50.0, "{}", result.model);
            assert_eq!(result.mean_absolute_error, 0.0, "{}", result.model);
        }
    }

    #[test]
    fn test_prediction_is_reproducible() {
        let predictor = PerformancePredictor::with_config(small_config());
        let sessions = varied_runs();

        let first = predictor.run(&sessions).unwrap();
        let second = predictor.run(&sessions).unwrap();

        assert_eq!(first.predicted_minutes.to_bits(), second.predicted_minutes.to_bits());
        assert_eq!(
            first.mean_absolute_error.to_bits(),
            second.mean_absolute_error.to_bits()
        );
    }

    #[test]
    fn test_next_vector_takes_mileage_from_latest_session() {
        let mut sessions = identical_runs(5);
        sessions.push(Session::new(day(33), 20_000.0, 6_600.0, None));
        let rows = FeatureBuilder::new().build(&sessions);

        let next = PerformancePredictor::new().next_vector(&rows).unwrap();

        // Pace and HR from the last 10K, mileage covers the 10K and the 20 km run
        assert_eq!(next[0], 5.0);
        assert_eq!(next[1], 150.0);
        assert_eq!(next[3], 30.0);
    }

    #[test]
    fn test_compare_models_declaration_order() {
        let config = PredictionConfig {
            model_family: ModelFamily::All,
            ..small_config()
        };
        let rows = FeatureBuilder::new().build(&varied_runs());
        let results = PerformancePredictor::with_config(config)
            .compare_models(&rows)
            .unwrap();

        let kinds: Vec<ModelKind> = results.iter().map(|r| r.model).collect();
        assert_eq!(
            kinds,
            vec![
                ModelKind::Linear,
                ModelKind::RandomForest,
                ModelKind::GradientBoosting
            ]
        );
        assert!(results.iter().all(|r| r.mean_absolute_error >= 0.0));
    }

    #[test]
    fn test_tolerance_band_is_inclusive() {
        let mut sessions = vec![
            Session::new(day(0), 9_800.0, 2_940.0, Some(150.0)),
            Session::new(day(8), 10_200.0, 3_060.0, Some(150.0)),
            Session::new(day(16), 9_790.0, 2_937.0, Some(150.0)),
            Session::new(day(24), 10_000.0, 3_000.0, None),
        ];
        sessions.push(Session::new(day(32), 21_100.0, 6_330.0, Some(150.0)));

        let rows = FeatureBuilder::new().build(&sessions);
        let qualifying = PerformancePredictor::new().qualifying_rows(&rows);

        assert_eq!(qualifying.len(), 2);
    }

    #[test]
    fn test_holdout_split_is_seeded() {
        let (train, holdout) = holdout_split(5, 0.25, 42);
        assert_eq!(holdout.len(), 2);
        assert_eq!(train.len(), 3);

        let mut all: Vec<usize> = train.iter().chain(&holdout).copied().collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);

        assert_eq!(holdout_split(5, 0.25, 42), (train, holdout));
    }

    #[test]
    fn test_config_validation() {
        assert!(PredictionConfig::default().validate().is_ok());

        let bad = PredictionConfig {
            holdout_fraction: 1.0,
            ..PredictionConfig::default()
        };
        assert!(bad.validate().is_err());

        assert_eq!("all".parse::<ModelFamily>().unwrap(), ModelFamily::All);
        assert!("svm".parse::<ModelFamily>().is_err());
    }
}
