use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// One raw activity record as returned by the fitness API
pub type RawActivity = serde_json::Map<String, serde_json::Value>;

/// Calendar period used for bucketing sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    /// ISO week starting on Monday
    Week,
    /// Calendar month
    Month,
}

impl std::str::FromStr for PeriodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "week" | "weekly" => Ok(PeriodKind::Week),
            "month" | "monthly" => Ok(PeriodKind::Month),
            _ => Err(format!("Invalid period: {}", s)),
        }
    }
}

/// One normalized, completed running activity
///
/// Derived values are computed once in [`Session::new`] and never change; the
/// fields are private so a normalized session cannot be mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    timestamp: NaiveDateTime,
    distance_meters: f64,
    moving_time_seconds: f64,
    average_heart_rate: Option<f64>,
    distance_km: f64,
    duration_minutes: f64,
    pace: Option<f64>,
    week_bucket: NaiveDate,
    month_bucket: NaiveDate,
}

impl Session {
    /// Build a session and cache its derived fields
    ///
    /// Heart rates that are not strictly positive are treated as missing.
    pub fn new(
        timestamp: NaiveDateTime,
        distance_meters: f64,
        moving_time_seconds: f64,
        average_heart_rate: Option<f64>,
    ) -> Self {
        let distance_km = distance_meters / 1000.0;
        let duration_minutes = moving_time_seconds / 60.0;
        let pace = if distance_km > 0.0 {
            Some(duration_minutes / distance_km)
        } else {
            None
        };
        let date = timestamp.date();

        Session {
            timestamp,
            distance_meters,
            moving_time_seconds,
            average_heart_rate: average_heart_rate.filter(|hr| *hr > 0.0),
            distance_km,
            duration_minutes,
            pace,
            week_bucket: week_start(date),
            month_bucket: month_start(date),
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Calendar day of the session
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn moving_time_seconds(&self) -> f64 {
        self.moving_time_seconds
    }

    pub fn average_heart_rate(&self) -> Option<f64> {
        self.average_heart_rate
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_minutes
    }

    /// Minutes per kilometre; `None` for zero-distance sessions
    pub fn pace(&self) -> Option<f64> {
        self.pace
    }

    /// Monday of the ISO week containing the session
    pub fn week_bucket(&self) -> NaiveDate {
        self.week_bucket
    }

    /// First day of the month containing the session
    pub fn month_bucket(&self) -> NaiveDate {
        self.month_bucket
    }

    /// Start of the bucket of the given kind
    pub fn bucket(&self, period: PeriodKind) -> NaiveDate {
        match period {
            PeriodKind::Week => self.week_bucket,
            PeriodKind::Month => self.month_bucket,
        }
    }

    /// Moving time rendered as `M:SS`
    pub fn formatted_time(&self) -> String {
        format_minutes(self.duration_minutes)
    }
}

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Render decimal minutes as `M:SS`, rounding to the nearest second
pub fn format_minutes(minutes: f64) -> String {
    if !minutes.is_finite() || minutes < 0.0 {
        return "-".to_string();
    }
    let total_seconds = (minutes * 60.0).round() as u64;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// True when sessions are in canonical (ascending timestamp) order
pub fn is_chronological(sessions: &[Session]) -> bool {
    sessions
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp)
}

/// Sort into canonical order; the sort is stable so ties keep ingestion order
pub fn sort_chronologically(sessions: &mut [Session]) {
    sessions.sort_by_key(|s| s.timestamp);
}

/// Borrow the slice when already canonical, otherwise sort a copy
pub fn ensure_chronological(sessions: &[Session]) -> Cow<'_, [Session]> {
    if is_chronological(sessions) {
        Cow::Borrowed(sessions)
    } else {
        let mut sorted = sessions.to_vec();
        sort_chronologically(&mut sorted);
        Cow::Owned(sorted)
    }
}
