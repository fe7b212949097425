use crate::error::CalculationError;
use crate::models::Session;
use chrono::{Days, NaiveDate};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// How the chronic window is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChronicBasis {
    /// Mean daily distance over the chronic window
    DailyMean,
    /// Mean daily distance × 7, a weekly-equivalent load
    WeeklyMean,
}

/// Workload configuration with customizable windows and risk thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Acute window in calendar days (default: 7)
    pub acute_days: u16,

    /// Chronic window in calendar days (default: 28)
    pub chronic_days: u16,

    /// ACWR below this is Low (default: 0.8)
    pub acwr_low_threshold: Decimal,

    /// ACWR above this is High (default: 1.3)
    pub acwr_high_threshold: Decimal,

    /// Chronic load scale (default: daily mean)
    pub chronic_basis: ChronicBasis,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            acute_days: 7,
            chronic_days: 28,
            acwr_low_threshold: dec!(0.8),
            acwr_high_threshold: dec!(1.3),
            chronic_basis: ChronicBasis::DailyMean,
        }
    }
}

impl WorkloadConfig {
    /// Wider optimal band (0.8 / 1.5)
    pub fn permissive() -> Self {
        WorkloadConfig {
            acwr_high_threshold: dec!(1.5),
            ..WorkloadConfig::default()
        }
    }

    /// Check windows and threshold ordering
    pub fn validate(&self) -> Result<(), CalculationError> {
        if self.acute_days == 0 || self.chronic_days == 0 {
            return Err(CalculationError::InvalidParameter {
                calculation: "workload".to_string(),
                parameter: "window days".to_string(),
                value: format!("{}/{}", self.acute_days, self.chronic_days),
            });
        }
        if self.acwr_low_threshold < Decimal::ZERO
            || self.acwr_low_threshold > self.acwr_high_threshold
        {
            return Err(CalculationError::InvalidParameter {
                calculation: "workload".to_string(),
                parameter: "acwr thresholds".to_string(),
                value: format!("{}/{}", self.acwr_low_threshold, self.acwr_high_threshold),
            });
        }
        Ok(())
    }
}

/// Injury-risk band derived from ACWR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcwrBand {
    Low,
    Optimal,
    High,
}

/// Red/amber/green indicator for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RagStatus {
    Red,
    Amber,
    Green,
}

impl AcwrBand {
    /// Classify a ratio; both thresholds belong to the Optimal band
    pub fn classify(acwr: Decimal, low: Decimal, high: Decimal) -> Self {
        if acwr < low {
            AcwrBand::Low
        } else if acwr <= high {
            AcwrBand::Optimal
        } else {
            AcwrBand::High
        }
    }

    /// Get band description
    pub fn description(&self) -> &'static str {
        match self {
            AcwrBand::Low => "Low load (detraining risk)",
            AcwrBand::Optimal => "Optimal load",
            AcwrBand::High => "High load (elevated injury risk)",
        }
    }

    /// Get training recommendation
    pub fn recommendation(&self) -> &'static str {
        match self {
            AcwrBand::Low => "Build volume gradually back toward your usual load",
            AcwrBand::Optimal => "Continue normal training progression",
            AcwrBand::High => "Reduce volume for a few days and prioritise recovery",
        }
    }

    pub fn rag(&self) -> RagStatus {
        match self {
            AcwrBand::Low => RagStatus::Amber,
            AcwrBand::Optimal => RagStatus::Green,
            AcwrBand::High => RagStatus::Red,
        }
    }
}

impl std::fmt::Display for AcwrBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcwrBand::Low => write!(f, "Low"),
            AcwrBand::Optimal => write!(f, "Optimal"),
            AcwrBand::High => write!(f, "High"),
        }
    }
}

/// Workload metrics for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadPoint {
    pub date: NaiveDate,

    /// Sum of same-day session distances (zero on rest days)
    pub daily_distance_km: Decimal,

    /// Trailing acute-window sum, inclusive of `date`
    pub acute_km: Decimal,

    /// Trailing chronic-window mean, inclusive of `date`
    pub chronic_km: Decimal,

    /// acute / chronic, zero when chronic is zero
    pub acwr: Decimal,

    pub band: AcwrBand,
}

/// Latest-day snapshot for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub as_of: NaiveDate,
    pub acute_km: Decimal,
    pub chronic_km: Decimal,
    pub acwr: Decimal,
    pub band: AcwrBand,

    /// Distance that would bring acute load to the middle of the optimal band
    pub suggested_distance_km: Decimal,
}

/// Core workload calculation engine
pub struct WorkloadCalculator {
    config: WorkloadConfig,
}

impl WorkloadCalculator {
    /// Create new workload calculator with default configuration
    pub fn new() -> Self {
        WorkloadCalculator {
            config: WorkloadConfig::default(),
        }
    }

    /// Create new workload calculator with custom configuration
    pub fn with_config(config: WorkloadConfig) -> Self {
        WorkloadCalculator { config }
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Sum session distance per calendar day (sparse)
    pub fn aggregate_daily_distance(&self, sessions: &[Session]) -> BTreeMap<NaiveDate, Decimal> {
        let mut daily: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for session in sessions {
            *daily.entry(session.date()).or_insert(Decimal::ZERO) += session_km(session);
        }
        daily
    }

    /// Dense day-by-day workload from the first to the last session date
    pub fn daily_workload(&self, sessions: &[Session]) -> Vec<WorkloadPoint> {
        let daily = self.aggregate_daily_distance(sessions);
        let (first, last) = match (daily.keys().next(), daily.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Vec::new(),
        };

        let acute_days = usize::from(self.config.acute_days.max(1));
        let chronic_days = usize::from(self.config.chronic_days.max(1));

        let mut history: Vec<Decimal> = Vec::new();
        let mut series = Vec::new();

        for date in first.iter_days().take_while(|d| *d <= last) {
            let distance = daily.get(&date).copied().unwrap_or(Decimal::ZERO);
            history.push(distance);

            let acute_km = trailing(&history, acute_days).iter().sum::<Decimal>();
            let chronic_window = trailing(&history, chronic_days);
            let (chronic_km, acwr) = self.chronic_and_ratio(
                acute_km,
                chronic_window.iter().sum::<Decimal>(),
                chronic_window.len(),
            );

            series.push(WorkloadPoint {
                date,
                daily_distance_km: distance,
                acute_km,
                chronic_km,
                acwr,
                band: self.classify(acwr),
            });
        }

        debug!(
            sessions = sessions.len(),
            days = series.len(),
            "Computed daily workload series"
        );

        series
    }

    /// Last-day acute/chronic/ACWR snapshot without building the dense series
    pub fn summary_workload(&self, sessions: &[Session]) -> Option<WorkloadSummary> {
        let first = sessions.iter().map(Session::date).min()?;
        let last = sessions.iter().map(Session::date).max()?;

        let acute_start = window_start(last, self.config.acute_days).max(first);
        let chronic_start = window_start(last, self.config.chronic_days).max(first);
        let chronic_len = (last - chronic_start).num_days() + 1;

        let total_between = |start: NaiveDate| -> Decimal {
            sessions
                .iter()
                .filter(|s| s.date() >= start && s.date() <= last)
                .map(session_km)
                .sum()
        };

        let acute_km = total_between(acute_start);
        let (chronic_km, acwr) = self.chronic_and_ratio(
            acute_km,
            total_between(chronic_start),
            usize::try_from(chronic_len).unwrap_or(1),
        );

        let band_mid =
            (self.config.acwr_low_threshold + self.config.acwr_high_threshold) / Decimal::TWO;
        let suggested_distance_km = (chronic_km * band_mid - acute_km).max(Decimal::ZERO);

        Some(WorkloadSummary {
            as_of: last,
            acute_km,
            chronic_km,
            acwr,
            band: self.classify(acwr),
            suggested_distance_km,
        })
    }

    /// Classify a ratio with the configured thresholds
    pub fn classify(&self, acwr: Decimal) -> AcwrBand {
        AcwrBand::classify(
            acwr,
            self.config.acwr_low_threshold,
            self.config.acwr_high_threshold,
        )
    }

    /// Chronic load and ACWR for one chronic window
    ///
    /// The ratio is taken from the undivided window total, so a ratio that is
    /// exactly representable is never disturbed by a rounded chronic mean.
    fn chronic_and_ratio(
        &self,
        acute_km: Decimal,
        window_total: Decimal,
        window_len: usize,
    ) -> (Decimal, Decimal) {
        if window_len == 0 || window_total <= Decimal::ZERO {
            return (Decimal::ZERO, Decimal::ZERO);
        }

        let days = Decimal::from(window_len);
        let scaled_total = match self.config.chronic_basis {
            ChronicBasis::DailyMean => window_total,
            ChronicBasis::WeeklyMean => window_total * Decimal::from(7),
        };

        (scaled_total / days, acute_km * days / scaled_total)
    }
}

impl Default for WorkloadCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Session distance in km as an exact decimal
fn session_km(session: &Session) -> Decimal {
    Decimal::from_f64(session.distance_meters()).unwrap_or(Decimal::ZERO) / Decimal::ONE_THOUSAND
}

fn trailing(history: &[Decimal], days: usize) -> &[Decimal] {
    &history[history.len().saturating_sub(days)..]
}

fn window_start(last: NaiveDate, days: u16) -> NaiveDate {
    last.checked_sub_days(Days::new(u64::from(days.max(1)) - 1))
        .unwrap_or(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use proptest::prelude::*;

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + Days::new(offset)
    }

    fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, 0, 0).unwrap()
    }

    fn run(offset: u64, meters: f64) -> Session {
        Session::new(at(day(offset), 7), meters, meters * 0.3, Some(150.0))
    }

    #[test]
    fn test_empty_input_yields_empty_series() {
        let calculator = WorkloadCalculator::new();
        assert!(calculator.daily_workload(&[]).is_empty());
        assert!(calculator.summary_workload(&[]).is_none());
    }

    #[test]
    fn test_series_is_dense() {
        let calculator = WorkloadCalculator::new();
        let sessions = vec![run(0, 5000.0), run(9, 8000.0)];

        let series = calculator.daily_workload(&sessions);

        assert_eq!(series.len(), 10);
        assert_eq!(series[0].date, day(0));
        assert_eq!(series[9].date, day(9));
        assert!(series[1..9]
            .iter()
            .all(|p| p.daily_distance_km == Decimal::ZERO));
    }

    #[test]
    fn test_same_day_sessions_are_summed() {
        let calculator = WorkloadCalculator::new();
        let sessions = vec![
            Session::new(at(day(0), 7), 5000.0, 1500.0, None),
            Session::new(at(day(0), 18), 3000.0, 900.0, None),
        ];

        let daily = calculator.aggregate_daily_distance(&sessions);
        assert_eq!(daily[&day(0)], dec!(8));
    }

    #[test]
    fn test_acute_and_chronic_windows() {
        let calculator = WorkloadCalculator::new();
        // 10 km every day for 30 days
        let sessions: Vec<Session> = (0..30).map(|d| run(d, 10_000.0)).collect();

        let series = calculator.daily_workload(&sessions);

        // Day 3: four days available
        assert_eq!(series[3].acute_km, dec!(40));
        assert_eq!(series[3].chronic_km, dec!(10));
        assert_eq!(series[3].acwr, dec!(4));

        // Day 29: full windows
        let last = &series[29];
        assert_eq!(last.acute_km, dec!(70));
        assert_eq!(last.chronic_km, dec!(10));
        assert_eq!(last.acwr, dec!(7));
        assert_eq!(last.band, AcwrBand::High);
    }

    #[test]
    fn test_weekly_chronic_basis_gives_unit_ratio_for_steady_load() {
        let calculator = WorkloadCalculator::with_config(WorkloadConfig {
            chronic_basis: ChronicBasis::WeeklyMean,
            ..WorkloadConfig::default()
        });
        let sessions: Vec<Session> = (0..28).map(|d| run(d, 10_000.0)).collect();

        let last = calculator.daily_workload(&sessions).pop().unwrap();
        assert_eq!(last.chronic_km, dec!(70));
        assert_eq!(last.acwr, Decimal::ONE);
        assert_eq!(last.band, AcwrBand::Optimal);
    }

    #[test]
    fn test_zero_chronic_gives_zero_ratio() {
        let calculator = WorkloadCalculator::new();
        let sessions = vec![run(0, 0.0)];

        let series = calculator.daily_workload(&sessions);
        assert_eq!(series[0].acwr, Decimal::ZERO);
        assert_eq!(series[0].band, AcwrBand::Low);
    }

    #[test]
    fn test_band_boundaries() {
        let low = dec!(0.8);
        let high = dec!(1.3);
        assert_eq!(AcwrBand::classify(dec!(0.79), low, high), AcwrBand::Low);
        assert_eq!(AcwrBand::classify(dec!(0.80), low, high), AcwrBand::Optimal);
        assert_eq!(AcwrBand::classify(dec!(1.30), low, high), AcwrBand::Optimal);
        assert_eq!(AcwrBand::classify(dec!(1.31), low, high), AcwrBand::High);
    }

    #[test]
    fn test_exact_boundary_ratio_with_repeating_chronic_mean() {
        let calculator = WorkloadCalculator::new();
        // 10 km over 13 days; the last 7 days hold 1 km, so ACWR is 13/10
        let mut sessions: Vec<Session> = (0..6).map(|d| run(d, 1_500.0)).collect();
        sessions.push(run(12, 1_000.0));

        let last = calculator.daily_workload(&sessions).pop().unwrap();
        assert_eq!(last.acute_km, dec!(1));
        assert_eq!(last.acwr, dec!(1.3));
        assert_eq!(last.band, AcwrBand::Optimal);

        let summary = calculator.summary_workload(&sessions).unwrap();
        assert_eq!(summary.acwr, dec!(1.3));
        assert_eq!(summary.band, AcwrBand::Optimal);
    }

    #[test]
    fn test_permissive_thresholds() {
        let calculator = WorkloadCalculator::with_config(WorkloadConfig::permissive());
        assert_eq!(calculator.classify(dec!(1.4)), AcwrBand::Optimal);
        assert_eq!(calculator.classify(dec!(1.51)), AcwrBand::High);
    }

    #[test]
    fn test_rag_mapping() {
        assert_eq!(AcwrBand::Low.rag(), RagStatus::Amber);
        assert_eq!(AcwrBand::Optimal.rag(), RagStatus::Green);
        assert_eq!(AcwrBand::High.rag(), RagStatus::Red);
    }

    #[test]
    fn test_summary_matches_last_point() {
        let calculator = WorkloadCalculator::new();
        let sessions = vec![
            run(0, 6000.0),
            run(3, 12000.0),
            run(10, 8000.0),
            run(31, 5000.0),
            run(33, 15000.0),
        ];

        let last = calculator.daily_workload(&sessions).pop().unwrap();
        let summary = calculator.summary_workload(&sessions).unwrap();

        assert_eq!(summary.as_of, last.date);
        assert_eq!(summary.acute_km, last.acute_km);
        assert_eq!(summary.chronic_km, last.chronic_km);
        assert_eq!(summary.acwr, last.acwr);
        assert_eq!(summary.band, last.band);
    }

    #[test]
    fn test_suggested_distance_never_negative() {
        let calculator = WorkloadCalculator::new();
        let sessions: Vec<Session> = (0..7).map(|d| run(d, 10_000.0)).collect();

        let summary = calculator.summary_workload(&sessions).unwrap();
        // chronic 10 × 1.05 - acute 70 < 0
        assert_eq!(summary.suggested_distance_km, Decimal::ZERO);
    }

    #[test]
    fn test_config_validation() {
        assert!(WorkloadConfig::default().validate().is_ok());

        let inverted = WorkloadConfig {
            acwr_low_threshold: dec!(1.5),
            acwr_high_threshold: dec!(1.3),
            ..WorkloadConfig::default()
        };
        assert!(inverted.validate().is_err());

        let no_window = WorkloadConfig {
            acute_days: 0,
            ..WorkloadConfig::default()
        };
        assert!(no_window.validate().is_err());
    }

    proptest! {
        #[test]
        fn test_workload_series_properties(
            runs in prop::collection::vec((0u64..90, 0u32..30_000), 1..40)
        ) {
            let calculator = WorkloadCalculator::new();
            let sessions: Vec<Session> = runs
                .iter()
                .map(|(offset, meters)| run(*offset, f64::from(*meters)))
                .collect();

            let series = calculator.daily_workload(&sessions);

            let first = runs.iter().map(|(o, _)| *o).min().unwrap();
            let last = runs.iter().map(|(o, _)| *o).max().unwrap();
            prop_assert_eq!(series.len() as u64, last - first + 1);

            for (i, point) in series.iter().enumerate() {
                let start = i.saturating_sub(6);
                let max_daily = series[start..=i]
                    .iter()
                    .map(|p| p.daily_distance_km)
                    .fold(Decimal::ZERO, Decimal::max);
                prop_assert!(point.acute_km <= max_daily * Decimal::from(7));
                prop_assert!(point.chronic_km >= Decimal::ZERO);
            }

            let summary = calculator.summary_workload(&sessions).unwrap();
            let tail = series.last().unwrap();
            prop_assert_eq!(summary.acute_km, tail.acute_km);
            prop_assert_eq!(summary.chronic_km, tail.chronic_km);
            prop_assert_eq!(summary.acwr, tail.acwr);
        }
    }
}
