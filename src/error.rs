//! Unified error hierarchy for Stridewise
//!
//! Per-concern error enums that roll up into [`AnalyticsError`], with severity
//! levels and user-facing messages for the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all Stridewise operations
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A raw activity record could not be normalized
    #[error("Malformed record: {0}")]
    MalformedRecord(#[from] MalformedRecordError),

    /// Prediction failures (including insufficient data)
    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),

    /// Calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Activity source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a raw activity record is rejected during normalization
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedRecordError {
    /// Required field absent or null
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Field present but unusable
    #[error("Invalid value in {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Performance prediction errors
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Not enough qualifying sessions to train and evaluate a model
    #[error("Insufficient data: {qualifying} qualifying sessions, need at least {required}")]
    InsufficientData { qualifying: usize, required: usize },

    /// Model fitting failed
    #[error("Model {model} failed to fit: {reason}")]
    FitFailed { model: String, reason: String },
}

/// Calculation errors
#[derive(Debug, Error)]
pub enum CalculationError {
    /// Invalid parameter
    #[error("Invalid parameter for {calculation}: {parameter}={value}")]
    InvalidParameter {
        calculation: String,
        parameter: String,
        value: String,
    },

    /// Requested month is malformed or has no sessions
    #[error("No sessions for month '{month}' (available: {available})")]
    UnknownMonth { month: String, available: String },
}

/// Activity source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Dump file not found
    #[error("Activity file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Dump could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dump is not a JSON array of objects
    #[error("Invalid activity data in {path}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Unsupported format
    #[error("Unsupported export format: {format}")]
    UnsupportedFormat { format: String },

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error while writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Stridewise operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

impl AnalyticsError {
    /// True when the caller should show "not enough data" rather than an error
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            AnalyticsError::Prediction(PredictionError::InsufficientData { .. })
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnalyticsError::MalformedRecord(_) => ErrorSeverity::Warning,
            AnalyticsError::Prediction(PredictionError::InsufficientData { .. }) => {
                ErrorSeverity::Info
            }
            AnalyticsError::Source(SourceError::FileNotFound { .. }) => ErrorSeverity::Warning,
            AnalyticsError::Configuration(_) => ErrorSeverity::Error,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AnalyticsError::Prediction(PredictionError::InsufficientData {
                qualifying,
                required,
            }) => format!(
                "Not enough data: found {} qualifying runs, need at least {}.",
                qualifying, required
            ),
            AnalyticsError::Source(SourceError::FileNotFound { path }) => {
                format!("Could not find activity file: {}", path.display())
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that prevents the operation
    Error,
    /// Recovered problem worth surfacing
    Warning,
    /// Expected outcome the user should be told about
    Info,
}
