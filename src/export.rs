//! CSV and JSON export of analytics results
//!
//! Every result type in the crate is `Serialize`, so one generic writer covers
//! sessions, period summaries, workload points and predictions.

use crate::error::ExportError;
use crate::models::Session;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        extension.parse()
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// Flat, display-oriented view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub start: NaiveDateTime,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub pace_min_per_km: Option<f64>,
    pub average_heart_rate: Option<f64>,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        SessionRecord {
            start: session.timestamp(),
            distance_km: session.distance_km(),
            duration_minutes: session.duration_minutes(),
            pace_min_per_km: session.pace(),
            average_heart_rate: session.average_heart_rate(),
        }
    }
}

/// Serialize rows to any writer
pub fn write_rows<W: Write, T: Serialize>(
    writer: W,
    rows: &[T],
    format: ExportFormat,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            for row in rows {
                csv_writer.serialize(row)?;
            }
            csv_writer.flush()?;
        }
        ExportFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Serialize rows to a file, creating parent directories as needed
pub fn export_rows<T: Serialize, P: AsRef<Path>>(
    rows: &[T],
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    let path = output_path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = BufWriter::new(File::create(path)?);
    write_rows(file, rows, format)?;

    info!(path = %path.display(), rows = rows.len(), ?format, "Exported results");
    Ok(())
}
