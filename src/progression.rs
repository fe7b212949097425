//! Month-over-month progression views: best times per distance class and
//! pace against heart rate.

use crate::models::{ensure_chronological, Session};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Half-open distance class `[lower_km, upper_km)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceClass {
    pub lower_km: f64,
    pub upper_km: f64,
}

impl DistanceClass {
    pub fn new(lower_km: f64, upper_km: f64) -> Self {
        DistanceClass { lower_km, upper_km }
    }

    /// 9.5–10.5 km
    pub fn ten_k() -> Self {
        DistanceClass::new(9.5, 10.5)
    }

    pub fn contains(&self, distance_km: f64) -> bool {
        self.lower_km <= distance_km && distance_km < self.upper_km
    }
}

impl Default for DistanceClass {
    fn default() -> Self {
        Self::ten_k()
    }
}

/// Fastest moving time per month for one distance class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBestTimes {
    /// Month start → best duration in minutes
    pub best_minutes: BTreeMap<NaiveDate, f64>,

    /// Mean of the monthly bests, `None` when no month qualifies
    pub mean_best_minutes: Option<f64>,
}

impl MonthlyBestTimes {
    pub fn is_empty(&self) -> bool {
        self.best_minutes.is_empty()
    }
}

/// Aggregate pace and heart rate for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPaceHeartRate {
    pub month: NaiveDate,

    /// Total minutes over total km; absent when no distance was covered
    pub pace: Option<f64>,

    /// Mean of the sessions that recorded heart rate
    pub average_heart_rate: Option<f64>,

    pub session_count: usize,
}

pub fn monthly_best_times(sessions: &[Session], class: DistanceClass) -> MonthlyBestTimes {
    let mut best_minutes: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for session in sessions.iter().filter(|s| class.contains(s.distance_km())) {
        best_minutes
            .entry(session.month_bucket())
            .and_modify(|best| {
                if session.duration_minutes() < *best {
                    *best = session.duration_minutes();
                }
            })
            .or_insert(session.duration_minutes());
    }

    let mean_best_minutes = if best_minutes.is_empty() {
        None
    } else {
        Some(best_minutes.values().mean())
    };

    MonthlyBestTimes {
        best_minutes,
        mean_best_minutes,
    }
}

pub fn pace_vs_heart_rate(sessions: &[Session], class: DistanceClass) -> Vec<MonthlyPaceHeartRate> {
    #[derive(Default)]
    struct Totals {
        minutes: f64,
        km: f64,
        heart_rates: Vec<f64>,
        count: usize,
    }

    let mut months: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for session in sessions.iter().filter(|s| class.contains(s.distance_km())) {
        let totals = months.entry(session.month_bucket()).or_default();
        totals.minutes += session.duration_minutes();
        totals.km += session.distance_km();
        totals.count += 1;
        if let Some(hr) = session.average_heart_rate() {
            totals.heart_rates.push(hr);
        }
    }

    months
        .into_iter()
        .map(|(month, totals)| MonthlyPaceHeartRate {
            month,
            pace: (totals.km > 0.0).then(|| totals.minutes / totals.km),
            average_heart_rate: (!totals.heart_rates.is_empty())
                .then(|| totals.heart_rates.iter().mean()),
            session_count: totals.count,
        })
        .collect()
}

/// The `n` most recent sessions, oldest first
pub fn last_sessions(sessions: &[Session], n: usize) -> Vec<Session> {
    let sorted = ensure_chronological(sessions);
    let skip = sorted.len().saturating_sub(n);
    sorted[skip..].to_vec()
}
