//! Activity sources
//!
//! A source materialises raw activity records for the normalizer. Sources are
//! configured at construction; the analytics engine itself takes no global settings.
//! The start-time field used by the `since` filter is the normalizer's, so the two
//! always read the same timestamp.

use crate::error::SourceError;
use crate::models::RawActivity;
use crate::normalize::{parse_start_time, NormalizerConfig};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supplies raw activity records
pub trait ActivitySource {
    /// Records starting at or after `since`
    ///
    /// Records whose start time cannot be read are passed through untouched so the
    /// normalizer can reject and report them.
    fn fetch(&self, since: NaiveDateTime) -> Result<Vec<RawActivity>, SourceError>;

    /// Human-readable source name for logs
    fn name(&self) -> &'static str;
}

/// Source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON array of activity objects
    pub path: PathBuf,

    /// Earliest activity date fetched by default
    pub since: NaiveDate,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            path: PathBuf::from("activities.json"),
            since: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}

impl SourceConfig {
    /// Start of the configured `since` day
    pub fn since_timestamp(&self) -> NaiveDateTime {
        self.since.and_time(chrono::NaiveTime::MIN)
    }
}

/// Reads a JSON dump of activities from disk
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    config: SourceConfig,
    start_time_field: String,
}

impl JsonFileSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            start_time_field: NormalizerConfig::default().start_time_field,
        }
    }

    /// Filter on the start-time field the normalizer reads
    pub fn with_normalizer(mut self, normalizer: &NormalizerConfig) -> Self {
        self.start_time_field = normalizer.start_time_field.clone();
        self
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Fetch from the configured `since` date
    pub fn fetch_default(&self) -> Result<Vec<RawActivity>, SourceError> {
        self.fetch(self.config.since_timestamp())
    }

    fn read_records(&self) -> Result<Vec<RawActivity>, SourceError> {
        let path = &self.config.path;
        if !path.exists() {
            return Err(SourceError::FileNotFound { path: path.clone() });
        }

        let content = fs::read_to_string(path).map_err(|source| SourceError::Read {
            path: path.clone(),
            source,
        })?;

        let values: Vec<Value> =
            serde_json::from_str(&content).map_err(|e| SourceError::InvalidFormat {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::Object(record) => Ok(record),
                other => Err(SourceError::InvalidFormat {
                    path: path.clone(),
                    reason: format!("record {} is not an object: {}", index, other),
                }),
            })
            .collect()
    }
}

impl ActivitySource for JsonFileSource {
    fn fetch(&self, since: NaiveDateTime) -> Result<Vec<RawActivity>, SourceError> {
        let records = self.read_records()?;
        let total = records.len();
        let kept = filter_since(records, since, &self.start_time_field);

        info!(
            path = %self.config.path.display(),
            total,
            kept = kept.len(),
            "Loaded activity records"
        );

        Ok(kept)
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

/// Serves records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<RawActivity>,
    start_time_field: String,
}

impl InMemorySource {
    pub fn new(records: Vec<RawActivity>) -> Self {
        Self {
            records,
            start_time_field: NormalizerConfig::default().start_time_field,
        }
    }

    /// Filter on the start-time field the normalizer reads
    pub fn with_normalizer(mut self, normalizer: &NormalizerConfig) -> Self {
        self.start_time_field = normalizer.start_time_field.clone();
        self
    }
}

impl ActivitySource for InMemorySource {
    fn fetch(&self, since: NaiveDateTime) -> Result<Vec<RawActivity>, SourceError> {
        Ok(filter_since(self.records.clone(), since, &self.start_time_field))
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

fn filter_since(
    records: Vec<RawActivity>,
    since: NaiveDateTime,
    field: &str,
) -> Vec<RawActivity> {
    let before = records.len();
    let kept: Vec<RawActivity> = records
        .into_iter()
        .filter(|record| {
            match record.get(field).and_then(Value::as_str).and_then(parse_start_time) {
                Some(start) => start >= since,
                None => true,
            }
        })
        .collect();

    debug!(before, after = kept.len(), %since, "Applied since filter");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(value: Value) -> RawActivity {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn since(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_in_memory_since_filter() {
        let source = InMemorySource::new(vec![
            record(json!({"start_date": "2024-05-30T07:00:00Z", "distance": 5000.0, "moving_time": 1500})),
            record(json!({"start_date": "2024-06-01T00:00:00Z", "distance": 5000.0, "moving_time": 1500})),
            record(json!({"start_date": "garbage", "distance": 5000.0, "moving_time": 1500})),
        ]);

        let records = source.fetch(since(2024, 6, 1)).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_since_filter_reads_normalizer_field() {
        let normalizer = NormalizerConfig {
            start_time_field: "started_at".to_string(),
            ..NormalizerConfig::default()
        };
        let records = vec![
            record(json!({
                "started_at": "2024-05-30T07:00:00Z",
                "start_date": "2024-06-02T07:00:00Z"
            })),
            record(json!({
                "started_at": "2024-06-02T07:00:00Z",
                "start_date": "2024-05-30T07:00:00Z"
            })),
        ];

        let kept = InMemorySource::new(records)
            .with_normalizer(&normalizer)
            .fetch(since(2024, 6, 1))
            .unwrap();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["started_at"], json!("2024-06-02T07:00:00Z"));
    }

    #[test]
    fn test_json_file_source() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"start_date": "2024-06-03T07:00:00Z", "distance": 10000.0, "moving_time": 3000, "average_heartrate": 150.0}},
               {{"start_date": "2024-05-03T07:00:00Z", "distance": 8000.0, "moving_time": 2400}}]"#
        )
        .unwrap();

        let source = JsonFileSource::new(SourceConfig {
            path: file.path().to_path_buf(),
            ..SourceConfig::default()
        });

        let records = source.fetch_default().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["distance"], json!(10000.0));
    }

    #[test]
    fn test_missing_file() {
        let source = JsonFileSource::new(SourceConfig {
            path: PathBuf::from("/nonexistent/activities.json"),
            ..SourceConfig::default()
        });

        assert!(matches!(
            source.fetch_default(),
            Err(SourceError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_non_array_is_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"distance": 1}}"#).unwrap();

        let source = JsonFileSource::new(SourceConfig {
            path: file.path().to_path_buf(),
            ..SourceConfig::default()
        });

        assert!(matches!(
            source.fetch_default(),
            Err(SourceError::InvalidFormat { .. })
        ));
    }
}
