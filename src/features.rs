//! Feature engineering for performance prediction
//!
//! Each session becomes a [`FeatureRow`] carrying pace, pace-to-heart-rate ratio and
//! trailing 7-day mileage.
//!
//! The trailing mileage window is continuous elapsed time, `(t - 7×24h, t]`, ending
//! at the current row. This differs from the calendar-day windows
//! in [`crate::workload`]: a run at 18:00 falls out of the window at 18:00 seven days
//! later, not at midnight. The two are not interchangeable.

use crate::models::{ensure_chronological, Session};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Model input columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// pace, average HR, pace/HR, trailing 7-day km
    Standard,
    /// Standard plus session distance in km
    WithDistance,
}

impl FeatureSet {
    /// Column names in vector order
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            FeatureSet::Standard => &["pace", "average_hr", "pace_to_hr", "trailing_7d_km"],
            FeatureSet::WithDistance => &[
                "pace",
                "average_hr",
                "pace_to_hr",
                "trailing_7d_km",
                "distance_km",
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

/// A session augmented with engineered features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub session: Session,

    /// Minutes per km; missing for zero-distance sessions
    pub pace: Option<f64>,

    /// Pace divided by average HR; missing when either is missing or zero
    pub pace_to_hr: Option<f64>,

    /// Distance run in the elapsed 7 days up to and including this session
    pub trailing_7d_km: f64,
}

impl FeatureRow {
    /// True when every model input is present
    pub fn is_complete(&self) -> bool {
        self.vector(FeatureSet::Standard).is_some()
    }

    /// Feature vector, or `None` when a required feature is missing
    pub fn vector(&self, set: FeatureSet) -> Option<Vec<f64>> {
        self.vector_with(set, self.session.distance_km(), self.trailing_7d_km)
    }

    /// Feature vector with the distance and trailing mileage columns supplied
    ///
    /// Pace, heart rate and pace/HR come from this row. The distance only
    /// appears in [`FeatureSet::WithDistance`] vectors.
    pub fn vector_with(
        &self,
        set: FeatureSet,
        distance_km: f64,
        trailing_7d_km: f64,
    ) -> Option<Vec<f64>> {
        let pace = self.pace?;
        let heart_rate = self.session.average_heart_rate()?;
        let pace_to_hr = self.pace_to_hr?;

        let mut vector = vec![pace, heart_rate, pace_to_hr, trailing_7d_km];
        if set == FeatureSet::WithDistance {
            vector.push(distance_km);
        }
        Some(vector)
    }
}

/// Builds feature rows over a chronological session sequence
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    trailing_window: Duration,
}

impl FeatureBuilder {
    /// Seven-day trailing window
    pub fn new() -> Self {
        FeatureBuilder {
            trailing_window: Duration::days(7),
        }
    }

    /// One feature row per session, in chronological order
    pub fn build(&self, sessions: &[Session]) -> Vec<FeatureRow> {
        let sessions = ensure_chronological(sessions);
        let mut rows = Vec::with_capacity(sessions.len());
        let mut window_start = 0;

        for (i, session) in sessions.iter().enumerate() {
            let cutoff = session.timestamp() - self.trailing_window;
            while window_start < i && sessions[window_start].timestamp() <= cutoff {
                window_start += 1;
            }

            let trailing_7d_km = sessions[window_start..=i]
                .iter()
                .map(Session::distance_km)
                .sum();

            let pace = session.pace();
            let pace_to_hr = match (pace, session.average_heart_rate()) {
                (Some(pace), Some(hr)) if hr > 0.0 => Some(pace / hr),
                _ => None,
            };

            rows.push(FeatureRow {
                session: session.clone(),
                pace,
                pace_to_hr,
                trailing_7d_km,
            });
        }

        debug!(
            rows = rows.len(),
            complete = rows.iter().filter(|r| r.is_complete()).count(),
            "Built feature rows"
        );

        rows
    }
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_pace_and_ratio() {
        let sessions = vec![Session::new(at(1, 7), 10_000.0, 3_000.0, Some(150.0))];
        let rows = FeatureBuilder::new().build(&sessions);

        assert_eq!(rows[0].pace, Some(5.0));
        assert_eq!(rows[0].pace_to_hr, Some(5.0 / 150.0));
        assert_eq!(rows[0].trailing_7d_km, 10.0);
        assert!(rows[0].is_complete());
    }

    #[test]
    fn test_missing_heart_rate_propagates() {
        let sessions = vec![Session::new(at(1, 7), 10_000.0, 3_000.0, None)];
        let rows = FeatureBuilder::new().build(&sessions);

        assert_eq!(rows[0].pace_to_hr, None);
        assert!(!rows[0].is_complete());
        assert_eq!(rows[0].vector(FeatureSet::Standard), None);
    }

    #[test]
    fn test_zero_distance_has_no_features() {
        let sessions = vec![Session::new(at(1, 7), 0.0, 600.0, Some(120.0))];
        let rows = FeatureBuilder::new().build(&sessions);

        assert_eq!(rows[0].pace, None);
        assert_eq!(rows[0].pace_to_hr, None);
    }

    #[test]
    fn test_trailing_window_uses_elapsed_time() {
        let sessions = vec![
            Session::new(at(1, 18), 5_000.0, 1_500.0, Some(140.0)),
            Session::new(at(4, 7), 8_000.0, 2_400.0, Some(145.0)),
            // Exactly seven days after the first run: the first run drops out
            Session::new(at(8, 18), 10_000.0, 3_000.0, Some(150.0)),
        ];
        let rows = FeatureBuilder::new().build(&sessions);

        assert_eq!(rows[0].trailing_7d_km, 5.0);
        assert_eq!(rows[1].trailing_7d_km, 13.0);
        assert_eq!(rows[2].trailing_7d_km, 18.0);
    }

    #[test]
    fn test_partial_day_stays_in_window() {
        let sessions = vec![
            Session::new(at(1, 18), 5_000.0, 1_500.0, Some(140.0)),
            Session::new(at(8, 17), 10_000.0, 3_000.0, Some(150.0)),
        ];
        let rows = FeatureBuilder::new().build(&sessions);

        // 6 days 23 hours elapsed: still inside the window
        assert_eq!(rows[1].trailing_7d_km, 15.0);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let sessions = vec![
            Session::new(at(3, 7), 8_000.0, 2_400.0, Some(145.0)),
            Session::new(at(1, 7), 5_000.0, 1_500.0, Some(140.0)),
        ];
        let rows = FeatureBuilder::new().build(&sessions);

        assert_eq!(rows[0].session.timestamp(), at(1, 7));
        assert_eq!(rows[1].trailing_7d_km, 13.0);
    }

    #[test]
    fn test_vector_with_pinned_distance() {
        let sessions = vec![Session::new(at(1, 7), 9_900.0, 2_970.0, Some(150.0))];
        let row = &FeatureBuilder::new().build(&sessions)[0];

        let standard = row.vector(FeatureSet::Standard).unwrap();
        assert_eq!(standard.len(), FeatureSet::Standard.len());

        let pinned = row.vector_with(FeatureSet::WithDistance, 10.0, 30.0).unwrap();
        assert_eq!(pinned.len(), 5);
        assert_eq!(pinned[3], 30.0);
        assert_eq!(pinned[4], 10.0);
    }
}
