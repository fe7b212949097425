use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use stridewise::aggregate::{self, PeriodSummary};
use stridewise::export::{export_rows, ExportFormat, SessionRecord};
use stridewise::logging::{init_logging, LogLevel};
use stridewise::models::format_minutes;
use stridewise::progression::{self, DistanceClass};
use stridewise::source::{ActivitySource, JsonFileSource};
use stridewise::{
    AcwrBand, AnalyticsError, EngineConfig, FeatureBuilder, FeatureSet, ModelFamily,
    Normalizer, PerformancePredictor, PeriodKind, PredictionError, RagStatus, Session,
    WorkloadCalculator, WorkloadConfig,
};

/// Stridewise - Running Load & Performance Analytics
///
/// Weekly and monthly volume, acute:chronic workload ratio, progression and
/// 10K time prediction from an activity export.
#[derive(Parser)]
#[command(name = "stridewise")]
#[command(version)]
#[command(about = "Running load and performance analytics", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Activity JSON file (overrides the configured source path)
    #[arg(short, long, value_name = "FILE", global = true)]
    input: Option<PathBuf>,

    /// Ignore activities before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", global = true)]
    since: Option<NaiveDate>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the most recent sessions
    Sessions {
        /// Number of recent sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Write all sessions to a .csv or .json file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Weekly or monthly distance with a rolling mean
    Volume {
        /// Period to group by (week, month)
        #[arg(short, long, default_value = "week")]
        period: PeriodKind,

        /// Rolling mean window in periods (defaults to the configured window)
        #[arg(short, long)]
        window: Option<usize>,

        /// Restrict to one month (YYYY-MM)
        #[arg(short, long)]
        month: Option<String>,

        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Acute:chronic workload ratio and risk band
    Workload {
        /// Use the wider 0.8 / 1.5 optimal band
        #[arg(long)]
        permissive: bool,

        /// Number of recent days to tabulate
        #[arg(short, long, default_value = "14")]
        days: usize,

        /// Write the full daily series to a .csv or .json file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Monthly best times and pace against heart rate
    Progression {
        /// Lower bound of the distance class in km (inclusive)
        #[arg(long, default_value = "9.5")]
        lower: f64,

        /// Upper bound of the distance class in km (exclusive)
        #[arg(long, default_value = "10.5")]
        upper: f64,
    },

    /// Predict the next 10K time
    Predict {
        /// Model family (linear, random_forest, gradient_boosting, all)
        #[arg(short, long)]
        model: Option<ModelFamily>,

        /// Include session distance as a model feature
        #[arg(long)]
        with_distance: bool,

        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Show or initialise the configuration
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Print the configuration file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Distance (km)")]
    distance: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Pace (min/km)")]
    pace: String,
    #[tabled(rename = "Avg HR")]
    heart_rate: String,
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        SessionRow {
            date: session.timestamp().format("%Y-%m-%d %H:%M").to_string(),
            distance: format!("{:.2}", session.distance_km()),
            time: session.formatted_time(),
            pace: session.pace().map_or("-".to_string(), format_minutes),
            heart_rate: session
                .average_heart_rate()
                .map_or("-".to_string(), |hr| format!("{:.0}", hr)),
        }
    }
}

#[derive(Tabled)]
struct VolumeRow {
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Runs")]
    runs: usize,
    #[tabled(rename = "Distance (km)")]
    distance: String,
    #[tabled(rename = "Rolling mean (km)")]
    rolling: String,
}

#[derive(Tabled)]
struct WorkloadRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Day (km)")]
    daily: String,
    #[tabled(rename = "Acute (km)")]
    acute: String,
    #[tabled(rename = "Chronic (km)")]
    chronic: String,
    #[tabled(rename = "ACWR")]
    acwr: String,
    #[tabled(rename = "Band")]
    band: String,
}

#[derive(Tabled)]
struct ProgressionRow {
    #[tabled(rename = "Month")]
    month: String,
    #[tabled(rename = "Best time")]
    best: String,
    #[tabled(rename = "Pace (min/km)")]
    pace: String,
    #[tabled(rename = "Avg HR")]
    heart_rate: String,
}

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Predicted 10K")]
    predicted: String,
    #[tabled(rename = "MAE (min)")]
    mae: String,
    #[tabled(rename = "Runs")]
    runs: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let initialising = matches!(cli.command, Commands::Config { init: true, .. });
    let mut config = match &cli.config {
        Some(path) if path.exists() || !initialising => EngineConfig::load_from_file(path)?,
        Some(_) => EngineConfig::default(),
        None => EngineConfig::load_or_default(),
    };

    if cli.verbose > 0 {
        config.logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    init_logging(&config.logging)?;

    if let Some(input) = &cli.input {
        config.source.path = input.clone();
    }
    if let Some(since) = cli.since {
        config.source.since = since;
    }

    match cli.command {
        Commands::Config { init, path } => run_config(&cli.config, &config, init, path),
        Commands::Sessions { limit, export } => {
            let sessions = load_sessions(&config)?;
            run_sessions(&sessions, limit, export.as_deref())
        }
        Commands::Volume {
            period,
            window,
            month,
            export,
        } => {
            let sessions = load_sessions(&config)?;
            let window = window.unwrap_or(config.aggregation.rolling_window);
            run_volume(&sessions, period, window, month.as_deref(), export.as_deref())
        }
        Commands::Workload {
            permissive,
            days,
            export,
        } => {
            let sessions = load_sessions(&config)?;
            let workload_config = if permissive {
                WorkloadConfig {
                    acwr_high_threshold: WorkloadConfig::permissive().acwr_high_threshold,
                    ..config.workload.clone()
                }
            } else {
                config.workload.clone()
            };
            run_workload(&sessions, workload_config, days, export.as_deref())
        }
        Commands::Progression { lower, upper } => {
            let sessions = load_sessions(&config)?;
            run_progression(&sessions, DistanceClass::new(lower, upper));
            Ok(())
        }
        Commands::Predict {
            model,
            with_distance,
            export,
        } => {
            let sessions = load_sessions(&config)?;
            let mut prediction = config.prediction.clone();
            if let Some(model) = model {
                prediction.model_family = model;
            }
            if with_distance {
                prediction.feature_set = FeatureSet::WithDistance;
            }
            run_predict(&sessions, PerformancePredictor::with_config(prediction), export.as_deref())
        }
    }
}

fn load_sessions(config: &EngineConfig) -> Result<Vec<Session>> {
    config.validate()?;

    let source = JsonFileSource::new(config.source.clone()).with_normalizer(&config.normalizer);
    let records = source
        .fetch_default()
        .map_err(AnalyticsError::from)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let report = Normalizer::with_config(config.normalizer.clone()).normalize_sorted(&records);
    if report.dropped_count() > 0 {
        eprintln!(
            "{}",
            format!(
                "Skipped {} malformed activity record(s); loaded {}.",
                report.dropped_count(),
                report.accepted_count()
            )
            .yellow()
        );
    }

    Ok(report.sessions)
}

fn export_if_requested<T: serde::Serialize>(rows: &[T], path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        let format = ExportFormat::from_path(path)?;
        export_rows(rows, format, path)
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        println!("{} {}", "Exported to".green(), path.display());
    }
    Ok(())
}

fn run_sessions(sessions: &[Session], limit: usize, export: Option<&Path>) -> Result<()> {
    println!("{}", "Recent sessions".green().bold());

    let recent = progression::last_sessions(sessions, limit);
    let rows: Vec<SessionRow> = recent.iter().map(SessionRow::from).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    let records: Vec<SessionRecord> = sessions.iter().map(SessionRecord::from).collect();
    export_if_requested(&records, export)
}

fn run_volume(
    sessions: &[Session],
    period: PeriodKind,
    window: usize,
    month: Option<&str>,
    export: Option<&Path>,
) -> Result<()> {
    let month = month
        .map(|m| aggregate::select_month(sessions, m).map_err(AnalyticsError::from))
        .transpose()?;
    let sessions = aggregate::filter_month(sessions, month);

    let summaries = aggregate::period_summaries(&sessions, period);
    let series = aggregate::group_by_period(&sessions, period);
    let rolling = aggregate::rolling_mean(&series, window).map_err(AnalyticsError::from)?;

    let heading = match period {
        PeriodKind::Week => "Weekly distance",
        PeriodKind::Month => "Monthly distance",
    };
    println!("{}", heading.blue().bold());

    let rows: Vec<VolumeRow> = summaries
        .iter()
        .map(|summary: &PeriodSummary| VolumeRow {
            period: summary.period_start.to_string(),
            runs: summary.session_count,
            distance: format!("{:.1}", summary.distance_km),
            rolling: rolling
                .get(&summary.period_start)
                .map_or("-".to_string(), |v| format!("{:.1}", v)),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    if let Some(mean) = aggregate::series_mean(&series) {
        println!("Average per period: {:.1} km", mean);
    }

    export_if_requested(&summaries, export)
}

fn run_workload(
    sessions: &[Session],
    workload_config: WorkloadConfig,
    days: usize,
    export: Option<&Path>,
) -> Result<()> {
    let calculator = WorkloadCalculator::with_config(workload_config);
    let series = calculator.daily_workload(sessions);

    let Some(summary) = calculator.summary_workload(sessions) else {
        println!("{}", "No sessions to analyse.".yellow());
        return Ok(());
    };

    println!("{}", "Workload".cyan().bold());
    let skip = series.len().saturating_sub(days);
    let rows: Vec<WorkloadRow> = series[skip..]
        .iter()
        .map(|point| WorkloadRow {
            date: point.date.to_string(),
            daily: km(point.daily_distance_km),
            acute: km(point.acute_km),
            chronic: km(point.chronic_km),
            acwr: point.acwr.round_dp(2).to_string(),
            band: point.band.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    println!(
        "As of {}: acute {} km, chronic {} km, ACWR {} ({})",
        summary.as_of,
        km(summary.acute_km),
        km(summary.chronic_km),
        summary.acwr.round_dp(2),
        colored_band(summary.band)
    );
    println!("{}", summary.band.recommendation());
    if summary.suggested_distance_km > Decimal::ZERO {
        println!(
            "Suggested distance to reach the middle of the optimal band: {} km",
            km(summary.suggested_distance_km)
        );
    }

    export_if_requested(&series, export)
}

fn km(value: Decimal) -> String {
    value.round_dp(1).to_string()
}

fn colored_band(band: AcwrBand) -> ColoredString {
    let label = band.description();
    match band.rag() {
        RagStatus::Green => label.green(),
        RagStatus::Amber => label.yellow(),
        RagStatus::Red => label.red(),
    }
}

fn run_progression(sessions: &[Session], class: DistanceClass) {
    println!("{}", "Progression".magenta().bold());

    let bests = progression::monthly_best_times(sessions, class);
    if bests.is_empty() {
        println!(
            "{}",
            format!(
                "No runs between {} and {} km.",
                class.lower_km, class.upper_km
            )
            .yellow()
        );
        return;
    }

    let pace_hr = progression::pace_vs_heart_rate(sessions, class);
    let rows: Vec<ProgressionRow> = pace_hr
        .iter()
        .map(|month| ProgressionRow {
            month: month.month.format("%Y-%m").to_string(),
            best: bests
                .best_minutes
                .get(&month.month)
                .map_or("-".to_string(), |m| format_minutes(*m)),
            pace: month.pace.map_or("-".to_string(), format_minutes),
            heart_rate: month
                .average_heart_rate
                .map_or("-".to_string(), |hr| format!("{:.0}", hr)),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    if let Some(mean) = bests.mean_best_minutes {
        println!("Average monthly best: {}", format_minutes(mean));
    }
}

fn run_predict(
    sessions: &[Session],
    predictor: PerformancePredictor,
    export: Option<&Path>,
) -> Result<()> {
    println!("{}", "10K prediction".yellow().bold());

    let rows = FeatureBuilder::new().build(sessions);
    let outcome = if predictor.config().model_family == ModelFamily::All {
        predictor.compare_models(&rows)
    } else {
        predictor.predict(&rows).map(|result| vec![result])
    };

    let results = match outcome {
        Ok(results) => results,
        Err(e @ PredictionError::InsufficientData { .. }) => {
            println!("{}", AnalyticsError::from(e).user_message().yellow());
            return Ok(());
        }
        Err(e) => return Err(AnalyticsError::from(e).into()),
    };

    let table_rows: Vec<PredictionRow> = results
        .iter()
        .map(|result| PredictionRow {
            model: result.model.to_string(),
            predicted: result.formatted_time(),
            mae: format!("{:.2}", result.mean_absolute_error),
            runs: result.training_sample_count,
        })
        .collect();
    println!("{}", Table::new(table_rows).with(Style::rounded()));

    export_if_requested(&results, export)
}

fn run_config(
    path: &Option<PathBuf>,
    config: &EngineConfig,
    init: bool,
    show_path: bool,
) -> Result<()> {
    let target = path.clone().unwrap_or_else(EngineConfig::default_config_path);

    if show_path {
        println!("{}", target.display());
        return Ok(());
    }

    if init {
        if target.exists() {
            anyhow::bail!("Config file already exists: {}", target.display());
        }
        EngineConfig::default().save_to_file(&target)?;
        println!("{} {}", "Wrote default configuration to".green(), target.display());
        return Ok(());
    }

    println!("{}", toml::to_string_pretty(config).context("Failed to render configuration")?);
    Ok(())
}
