use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DATA_DIR, ENV_SOURCE_CHUNK_DAYS, ENV_SOURCE_MAX_ATTEMPTS,
    ENV_SOURCE_TIMEOUT_SECS, ENV_SOURCE_URL, QUERY_DEFAULT_HOURS,
};

#[derive(Parser)]
#[command(name = "climate")]
#[command(version, about = "Hourly weather to renewable KPI pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Data directory holding the database
    #[arg(long, global = true, env = ENV_DATA_DIR)]
    pub data_dir: Option<PathBuf>,

    /// Weather source base URL
    #[arg(long, global = true, env = ENV_SOURCE_URL)]
    pub source_url: Option<String>,

    /// Per-attempt fetch timeout in seconds
    #[arg(long, global = true, env = ENV_SOURCE_TIMEOUT_SECS)]
    pub source_timeout_secs: Option<u64>,

    /// Fetch attempts per unit before its hours are skipped
    #[arg(long, global = true, env = ENV_SOURCE_MAX_ATTEMPTS)]
    pub source_max_attempts: Option<u32>,

    /// Days covered by one fetch unit
    #[arg(long, global = true, env = ENV_SOURCE_CHUNK_DAYS)]
    pub source_chunk_days: Option<u32>,
}

/// Site and inclusive date range shared by the batch stages
#[derive(Args, Clone, Debug)]
pub struct WindowArgs {
    /// Site name, as configured under `sites`
    #[arg(long)]
    pub site: String,

    /// First day (YYYYMMDD, UTC)
    #[arg(long)]
    pub start: String,

    /// Last day, inclusive (YYYYMMDD, UTC)
    #[arg(long)]
    pub end: String,
}

/// Window plus an optional captured response to replay instead of fetching
#[derive(Args, Clone, Debug)]
pub struct IngestArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    /// NASA POWER JSON response to ingest instead of calling the API
    #[arg(long)]
    pub replay: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Fetch observations into the raw layer
    Ingest(IngestArgs),
    /// Validate raw rows into the fact layer
    Clean(WindowArgs),
    /// Derive generation features from fact rows
    Features(WindowArgs),
    /// Derive capacity factors from features
    Kpis(WindowArgs),
    /// Run ingest, clean, features and kpis in order
    Run(IngestArgs),
    /// Store and read externally produced forecasts
    Forecast {
        #[command(subcommand)]
        command: ForecastCommands,
    },
    /// List sites present in the raw layer
    Sites,
    /// Most recent cleaned hours for a site, newest first
    Hourly {
        #[arg(long)]
        site: String,
        #[arg(long, default_value_t = QUERY_DEFAULT_HOURS)]
        hours: u32,
    },
    /// Most recent raw hours for a site, newest first
    Raw {
        #[arg(long)]
        site: String,
        #[arg(long, default_value_t = QUERY_DEFAULT_HOURS)]
        hours: u32,
    },
    /// Row counts and kept percentage for a site
    Health {
        #[arg(long)]
        site: String,
    },
    /// Row counts and latest timestamp per table
    Summary,
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum ForecastCommands {
    /// Store a single forecast
    Put {
        #[arg(long)]
        site: String,
        /// Target hour (RFC 3339, UTC)
        #[arg(long)]
        ts: String,
        /// baseline or sarimax
        #[arg(long)]
        model: String,
        /// pv or wind
        #[arg(long)]
        var: String,
        /// Hours ahead (1-48)
        #[arg(long)]
        horizon: i64,
        #[arg(long)]
        yhat: f64,
        #[arg(long)]
        lower: f64,
        #[arg(long)]
        upper: f64,
    },
    /// Store a JSON array of forecasts in one transaction
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// List stored forecasts for a site and date range
    List(WindowArgs),
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete the local data directory (database included). Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub source_url: Option<String>,
    pub source_timeout_secs: Option<u64>,
    pub source_max_attempts: Option<u32>,
    pub source_chunk_days: Option<u32>,
}

impl From<&Cli> for CliConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            data_dir: cli.data_dir.clone(),
            source_url: cli.source_url.clone(),
            source_timeout_secs: cli.source_timeout_secs,
            source_max_attempts: cli.source_max_attempts,
            source_chunk_days: cli.source_chunk_days,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig::from(&cli);
    (config, cli.command)
}
