//! Calendar period aggregation.
//!
//! Period series are sparse: a week or month without sessions is simply absent.
//! Consumers that need a dense day-level series use [`crate::workload`].

use crate::error::CalculationError;
use crate::models::{PeriodKind, Session};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Period start → summed distance in km, in chronological order
pub type PeriodSeries = BTreeMap<NaiveDate, f64>;

/// Aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Number of periods averaged by the rolling mean (default: 4)
    pub rolling_window: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig { rolling_window: 4 }
    }
}

/// Totals for one calendar period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period_start: NaiveDate,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub session_count: usize,
}

/// Sum session distance per period
pub fn group_by_period(sessions: &[Session], period: PeriodKind) -> PeriodSeries {
    let mut series = PeriodSeries::new();
    for session in sessions {
        *series.entry(session.bucket(period)).or_insert(0.0) += session.distance_km();
    }
    series
}

/// Distance, moving time and session count per period
pub fn period_summaries(sessions: &[Session], period: PeriodKind) -> Vec<PeriodSummary> {
    let mut buckets: BTreeMap<NaiveDate, PeriodSummary> = BTreeMap::new();

    for session in sessions {
        let start = session.bucket(period);
        buckets
            .entry(start)
            .and_modify(|summary| {
                summary.distance_km += session.distance_km();
                summary.duration_minutes += session.duration_minutes();
                summary.session_count += 1;
            })
            .or_insert(PeriodSummary {
                period_start: start,
                distance_km: session.distance_km(),
                duration_minutes: session.duration_minutes(),
                session_count: 1,
            });
    }

    buckets.into_values().collect()
}

/// Trailing mean over the last `window` periods that have data
///
/// Leading periods are averaged over however many periods exist so far.
pub fn rolling_mean(
    series: &PeriodSeries,
    window: usize,
) -> Result<PeriodSeries, CalculationError> {
    if window == 0 {
        return Err(CalculationError::InvalidParameter {
            calculation: "rolling mean".to_string(),
            parameter: "window".to_string(),
            value: window.to_string(),
        });
    }

    let values: Vec<f64> = series.values().copied().collect();

    Ok(series
        .keys()
        .enumerate()
        .map(|(i, period)| {
            let start = (i + 1).saturating_sub(window);
            (*period, values[start..=i].iter().mean())
        })
        .collect())
}

/// Average over all periods, `None` for an empty series
pub fn series_mean(series: &PeriodSeries) -> Option<f64> {
    if series.is_empty() {
        None
    } else {
        Some(series.values().mean())
    }
}

/// Distinct month buckets, chronological
pub fn available_months(sessions: &[Session]) -> Vec<NaiveDate> {
    let mut months: Vec<NaiveDate> = sessions.iter().map(Session::month_bucket).collect();
    months.sort();
    months.dedup();
    months
}

/// Resolve a `YYYY-MM` string to a month that has sessions
///
/// The error lists the months that do, so callers can show the choices.
pub fn select_month(sessions: &[Session], month: &str) -> Result<NaiveDate, CalculationError> {
    let available = available_months(sessions);
    NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
        .ok()
        .filter(|start| available.contains(start))
        .ok_or_else(|| CalculationError::UnknownMonth {
            month: month.to_string(),
            available: if available.is_empty() {
                "none".to_string()
            } else {
                available
                    .iter()
                    .map(|m| m.format("%Y-%m").to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        })
}

/// Sessions in the month starting at `month`, or all sessions when `None`
pub fn filter_month(sessions: &[Session], month: Option<NaiveDate>) -> Vec<Session> {
    match month {
        None => sessions.to_vec(),
        Some(month) => sessions
            .iter()
            .filter(|s| s.month_bucket() == month)
            .cloned()
            .collect(),
    }
}
