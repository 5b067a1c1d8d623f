//! Command implementations for the flu CLI.
//!
//! `fetch` downloads feed snapshots into a data directory; every other
//! subcommand reads those snapshots and prints JSON or writes CSV.

use clap::Subcommand;
use flu_data::severity::MetricType;
use std::{path::PathBuf, time::Duration};

pub mod config;
pub mod fetch;
pub mod report;

use config::AnalyticsConfig;

#[derive(Subcommand)]
pub enum Command {
    /// Download hospital, wastewater and Nextstrain snapshots
    Fetch {
        /// Directory the snapshot files are written to
        #[arg(short = 'o', long, default_value = "data")]
        out_dir: PathBuf,

        /// Row limit for the hospital and wastewater feeds
        #[arg(long, default_value_t = 500)]
        limit: u32,

        /// Only fetch records for this two-letter state code
        #[arg(long)]
        state: Option<String>,

        /// Reuse snapshots younger than this many seconds
        #[arg(long, default_value_t = fetch::DEFAULT_MAX_AGE_SECS)]
        max_age_secs: u64,

        /// Skip the Nextstrain tree (several megabytes)
        #[arg(long)]
        skip_nextstrain: bool,

        /// Analytics config JSON; its time_series_limit sets the weeks of national history
        #[arg(short = 'c', long)]
        config: Option<String>,
    },

    /// Print dashboard metrics, wastewater overview and variant summary
    Summary {
        #[arg(short = 'd', long, default_value = "data")]
        data_dir: PathBuf,

        /// Analytics config JSON
        #[arg(short = 'c', long)]
        config: Option<String>,
    },

    /// Print per-state severity fills for a metric
    Map {
        #[arg(short = 'd', long, default_value = "data")]
        data_dir: PathBuf,

        /// per100k, admissions, patients or wastewater
        #[arg(short = 'm', long, default_value = "per100k")]
        metric: MetricType,

        /// Write the fills to this CSV instead of printing JSON
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print the legend for a metric
    Legend {
        /// per100k, admissions, patients or wastewater
        #[arg(short = 'm', long, default_value = "per100k")]
        metric: MetricType,
    },

    /// Print trend, moving average, anomalies and forecast for one series
    Trend {
        #[arg(short = 'd', long, default_value = "data")]
        data_dir: PathBuf,

        /// per100k, admissions, patients or wastewater
        #[arg(short = 'm', long, default_value = "admissions")]
        metric: MetricType,

        /// Jurisdiction code; hospital metrics default to USA
        #[arg(short = 'j', long)]
        jurisdiction: Option<String>,

        /// Analytics config JSON
        #[arg(short = 'c', long)]
        config: Option<String>,
    },

    /// Export normalized records to CSV
    Export {
        #[arg(short = 'd', long, default_value = "data")]
        data_dir: PathBuf,

        /// Output path for hospital records
        #[arg(long)]
        hospital_csv: Option<PathBuf>,

        /// Output path for wastewater samples
        #[arg(long)]
        wastewater_csv: Option<PathBuf>,
    },
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Fetch {
            out_dir,
            limit,
            state,
            max_age_secs,
            skip_nextstrain,
            config,
        } => {
            let config = AnalyticsConfig::load(config.as_deref())?;
            let options = fetch::FetchOptions {
                out_dir,
                limit,
                national_limit: u32::try_from(config.time_series_limit)?,
                state,
                max_age: Duration::from_secs(max_age_secs),
                include_nextstrain: !skip_nextstrain,
            };
            fetch::run_fetch(&options).await
        }
        Command::Summary { data_dir, config } => {
            let config = AnalyticsConfig::load(config.as_deref())?;
            report::run_summary(&data_dir, &config)
        }
        Command::Map {
            data_dir,
            metric,
            csv,
        } => report::run_map(&data_dir, metric, csv.as_deref()),
        Command::Legend { metric } => report::run_legend(metric),
        Command::Trend {
            data_dir,
            metric,
            jurisdiction,
            config,
        } => {
            let config = AnalyticsConfig::load(config.as_deref())?;
            report::run_trend(&data_dir, metric, jurisdiction.as_deref(), &config)
        }
        Command::Export {
            data_dir,
            hospital_csv,
            wastewater_csv,
        } => report::run_export(&data_dir, hospital_csv.as_deref(), wastewater_csv.as_deref()),
    }
}
