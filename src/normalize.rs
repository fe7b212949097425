//! Raw activity records → canonical sessions.
//!
//! Records that lack a usable start time, distance or moving time are dropped
//! individually and reported; one bad record never fails the batch.

use crate::error::MalformedRecordError;
use crate::models::{sort_chronologically, RawActivity, Session};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Field names used to read raw activity records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Start time key (ISO-8601 string)
    pub start_time_field: String,

    /// Distance key, in meters
    pub distance_field: String,

    /// Moving time key, in seconds
    pub moving_time_field: String,

    /// Optional average heart rate key, in bpm
    pub heart_rate_field: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig {
            start_time_field: "start_date".to_string(),
            distance_field: "distance".to_string(),
            moving_time_field: "moving_time".to_string(),
            heart_rate_field: "average_heartrate".to_string(),
        }
    }
}

/// A record rejected during normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Position of the record in the input batch
    pub index: usize,
    pub error: MalformedRecordError,
}

/// Outcome of normalizing a batch
#[derive(Debug, Clone, Default)]
pub struct NormalizationReport {
    /// Accepted sessions, in input order
    pub sessions: Vec<Session>,
    pub rejected: Vec<RejectedRecord>,
}

impl NormalizationReport {
    pub fn accepted_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn dropped_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Converts raw activity records into sessions
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    /// Create a normalizer reading the default field names
    pub fn new() -> Self {
        Normalizer::default()
    }

    /// Create a normalizer with custom field names
    pub fn with_config(config: NormalizerConfig) -> Self {
        Normalizer { config }
    }

    /// Normalize a batch, keeping input order
    pub fn normalize(&self, records: &[RawActivity]) -> NormalizationReport {
        let mut report = NormalizationReport {
            sessions: Vec::with_capacity(records.len()),
            rejected: Vec::new(),
        };

        for (index, record) in records.iter().enumerate() {
            match self.normalize_record(record) {
                Ok(session) => report.sessions.push(session),
                Err(error) => {
                    warn!(index, %error, "Dropping malformed activity record");
                    report.rejected.push(RejectedRecord { index, error });
                }
            }
        }

        debug!(
            accepted = report.accepted_count(),
            dropped = report.dropped_count(),
            "Normalized activity batch"
        );

        report
    }

    /// Normalize a batch and return the canonical, chronologically sorted dataset
    pub fn normalize_sorted(&self, records: &[RawActivity]) -> NormalizationReport {
        let mut report = self.normalize(records);
        sort_chronologically(&mut report.sessions);
        report
    }

    /// Normalize a single record
    pub fn normalize_record(&self, record: &RawActivity) -> Result<Session, MalformedRecordError> {
        let field = &self.config.start_time_field;
        let timestamp = match record.get(field) {
            None | Some(Value::Null) => {
                return Err(MalformedRecordError::MissingField { field: field.clone() })
            }
            Some(Value::String(raw)) => {
                parse_start_time(raw).ok_or_else(|| MalformedRecordError::InvalidField {
                    field: field.clone(),
                    reason: format!("unrecognised timestamp '{}'", raw),
                })?
            }
            Some(other) => {
                return Err(MalformedRecordError::InvalidField {
                    field: field.clone(),
                    reason: format!("expected a string, found {}", other),
                })
            }
        };

        let distance_meters = self.required_quantity(record, &self.config.distance_field)?;
        let moving_time_seconds = self.required_quantity(record, &self.config.moving_time_field)?;

        // Missing or unusable heart rate is carried as None, never as 0
        let average_heart_rate = record
            .get(&self.config.heart_rate_field)
            .and_then(numeric_value)
            .filter(|hr| hr.is_finite() && *hr > 0.0);

        Ok(Session::new(
            timestamp,
            distance_meters,
            moving_time_seconds,
            average_heart_rate,
        ))
    }

    /// Read a required, finite, non-negative quantity
    fn required_quantity(
        &self,
        record: &RawActivity,
        field: &str,
    ) -> Result<f64, MalformedRecordError> {
        let raw = match record.get(field) {
            None | Some(Value::Null) => {
                return Err(MalformedRecordError::MissingField {
                    field: field.to_string(),
                })
            }
            Some(value) => value,
        };

        let value = numeric_value(raw).ok_or_else(|| MalformedRecordError::InvalidField {
            field: field.to_string(),
            reason: format!("not a number: {}", raw),
        })?;

        if !value.is_finite() || value < 0.0 {
            return Err(MalformedRecordError::InvalidField {
                field: field.to_string(),
                reason: format!("must be a non-negative finite number, got {}", value),
            });
        }

        Ok(value)
    }
}

/// Parse an activity start time into a naive wall-clock time
///
/// Offsets are dropped without conversion, so `2024-06-01T08:00:00+02:00` becomes
/// `2024-06-01 08:00:00`. Day and month buckets follow the time the athlete saw.
pub fn parse_start_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.naive_local());
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Numbers or numeric strings
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawActivity {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    fn valid_record(start: &str) -> RawActivity {
        record(json!({
            "start_date": start,
            "distance": 10000.0,
            "moving_time": 3000,
            "average_heartrate": 152.5
        }))
    }

    #[test]
    fn test_normalizes_valid_record() {
        let normalizer = Normalizer::new();
        let session = normalizer
            .normalize_record(&valid_record("2024-06-01T07:30:00Z"))
            .unwrap();

        assert_eq!(
            session.timestamp(),
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(7, 30, 0)
                .unwrap()
        );
        assert_eq!(session.distance_km(), 10.0);
        assert_eq!(session.duration_minutes(), 50.0);
        assert_eq!(session.average_heart_rate(), Some(152.5));
    }

    #[test]
    fn test_missing_distance_is_dropped() {
        let normalizer = Normalizer::new();
        let records = vec![
            valid_record("2024-06-01T07:30:00Z"),
            record(json!({ "start_date": "2024-06-02T07:30:00Z", "moving_time": 1800 })),
            valid_record("2024-06-03T07:30:00Z"),
        ];

        let report = normalizer.normalize(&records);

        assert_eq!(report.accepted_count(), records.len() - report.dropped_count());
        assert_eq!(report.accepted_count(), 2);
        assert_eq!(report.rejected[0].index, 1);
        assert_eq!(
            report.rejected[0].error,
            MalformedRecordError::MissingField {
                field: "distance".to_string()
            }
        );
    }

    #[test]
    fn test_unparsable_start_time_is_dropped() {
        let normalizer = Normalizer::new();
        let report = normalizer.normalize(&[valid_record("last tuesday")]);

        assert!(report.sessions.is_empty());
        assert!(matches!(
            report.rejected[0].error,
            MalformedRecordError::InvalidField { .. }
        ));
    }

    #[test]
    fn test_negative_distance_is_dropped() {
        let normalizer = Normalizer::new();
        let mut raw = valid_record("2024-06-01T07:30:00Z");
        raw.insert("distance".to_string(), json!(-5.0));

        assert!(normalizer.normalize_record(&raw).is_err());
    }

    #[test]
    fn test_missing_heart_rate_is_none_not_zero() {
        let normalizer = Normalizer::new();
        let mut raw = valid_record("2024-06-01T07:30:00Z");
        raw.remove("average_heartrate");
        assert_eq!(normalizer.normalize_record(&raw).unwrap().average_heart_rate(), None);

        raw.insert("average_heartrate".to_string(), Value::Null);
        assert_eq!(normalizer.normalize_record(&raw).unwrap().average_heart_rate(), None);

        raw.insert("average_heartrate".to_string(), json!(0));
        assert_eq!(normalizer.normalize_record(&raw).unwrap().average_heart_rate(), None);
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let normalizer = Normalizer::new();
        let raw = record(json!({
            "start_date": "2024-06-01 07:30:00",
            "distance": "5000",
            "moving_time": "1500.0"
        }));

        let session = normalizer.normalize_record(&raw).unwrap();
        assert_eq!(session.distance_km(), 5.0);
        assert_eq!(session.pace(), Some(5.0));
    }

    #[test]
    fn test_output_preserves_input_order() {
        let normalizer = Normalizer::new();
        let records = vec![
            valid_record("2024-06-03T07:30:00Z"),
            valid_record("2024-06-01T07:30:00Z"),
        ];

        let report = normalizer.normalize(&records);
        assert!(report.sessions[0].timestamp() > report.sessions[1].timestamp());

        let sorted = normalizer.normalize_sorted(&records);
        assert!(sorted.sessions[0].timestamp() < sorted.sessions[1].timestamp());
    }

    #[test]
    fn test_parse_start_time_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();

        assert_eq!(parse_start_time("2024-06-01T06:00:00Z"), Some(expected));
        assert_eq!(parse_start_time("2024-06-01T06:00:00+02:00"), Some(expected));
        assert_eq!(parse_start_time("2024-06-01T06:00:00"), Some(expected));
        assert_eq!(parse_start_time("2024-06-01 06:00:00"), Some(expected));
        assert_eq!(
            parse_start_time("2024-06-01"),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_start_time(""), None);

        // Late-evening local run stays on its local day
        assert_eq!(
            parse_start_time("2024-06-30T23:30:00-04:00").map(|t| t.date()),
            NaiveDate::from_ymd_opt(2024, 6, 30)
        );
    }
}
