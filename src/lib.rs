// Library interface for Stridewise
// The binary and the integration tests both go through these modules

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod predict;
pub mod progression;
pub mod source;
pub mod workload;

// Re-export commonly used types for convenience
pub use aggregate::{AggregationConfig, PeriodSeries, PeriodSummary};
pub use config::EngineConfig;
pub use error::{AnalyticsError, MalformedRecordError, PredictionError, Result};
pub use features::{FeatureBuilder, FeatureRow, FeatureSet};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::{PeriodKind, RawActivity, Session};
pub use normalize::{NormalizationReport, Normalizer, NormalizerConfig};
pub use predict::{ModelFamily, ModelKind, PerformancePredictor, PredictionConfig, PredictionResult};
pub use source::{ActivitySource, InMemorySource, JsonFileSource, SourceConfig};
pub use workload::{
    AcwrBand, RagStatus, WorkloadCalculator, WorkloadConfig, WorkloadPoint, WorkloadSummary,
};
