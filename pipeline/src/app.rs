//! Core application

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::watch;

use crate::core::cli::{
    self, CliConfig, Commands, ForecastCommands, IngestArgs, SystemCommands, WindowArgs,
};
use crate::core::config::{AppConfig, SiteCatalog};
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::storage::AppStorage;
use crate::data::SqliteService;
use crate::domain::{
    Cleaner, FeatureComputer, FetchPolicy, ForecastInput, ForecastStore, HourWindow, Ingestor,
    KpiComputer, NasaPowerSource, PipelineError, PipelineRunner, QueryService, StaticSource,
    WeatherSource,
};
use crate::utils::time::parse_iso_timestamp;

pub struct CoreApp {
    pub config: AppConfig,
    pub database: Arc<SqliteService>,
    pub sites: Arc<SiteCatalog>,
    shutdown_tx: watch::Sender<bool>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        if let Commands::System { command: system_cmd } = command {
            return Self::handle_system_command(system_cmd, &cli_config);
        }

        let app = Self::init(&cli_config).await?;
        app.install_signal_handler();

        let result = app.execute(command).await;
        if let Err(e) = &result {
            if let Some(pipeline_err) = e.downcast_ref::<PipelineError>() {
                tracing::error!(
                    transient = pipeline_err.is_transient(),
                    error = %pipeline_err,
                    "Command failed"
                );
            }
        }
        app.shutdown().await;
        result
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        let database = SqliteService::init(&storage, &config.database)
            .await
            .context("Failed to initialize database")?;
        let sites = Arc::new(config.sites.clone());
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            database: Arc::new(database),
            sites,
            shutdown_tx,
        })
    }

    /// First Ctrl+C stops further fetches; rows already written stay
    fn install_signal_handler(&self) {
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing current fetch unit");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    async fn shutdown(&self) {
        if let Err(e) = self.database.checkpoint().await {
            tracing::warn!(error = %e, "WAL checkpoint failed");
        }
        self.database.close().await;
    }

    async fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Ingest(args) => {
                let window = parse_window(&args.window)?;
                let ingestor = Ingestor::new(
                    self.database.clone(),
                    self.weather_source(&args).await?,
                    self.sites.clone(),
                    FetchPolicy::from_config(&self.config.source),
                )
                .with_shutdown(self.shutdown_tx.subscribe());
                print_json(&ingestor.ingest(&args.window.site, window).await?)
            }
            Commands::Clean(args) => {
                let window = parse_window(&args)?;
                let cleaner = Cleaner::new(self.database.clone());
                print_json(&cleaner.clean(&args.site, window).await?)
            }
            Commands::Features(args) => {
                let window = parse_window(&args)?;
                let computer = FeatureComputer::new(self.database.clone(), self.sites.clone());
                print_json(&computer.compute_features(&args.site, window).await?)
            }
            Commands::Kpis(args) => {
                let window = parse_window(&args)?;
                let computer = KpiComputer::new(self.database.clone(), self.sites.clone());
                print_json(&computer.compute_kpis(&args.site, window).await?)
            }
            Commands::Run(args) => {
                let window = parse_window(&args.window)?;
                let runner = PipelineRunner::new(
                    self.database.clone(),
                    self.weather_source(&args).await?,
                    self.sites.clone(),
                    FetchPolicy::from_config(&self.config.source),
                )
                .with_shutdown(self.shutdown_tx.subscribe());
                print_json(&runner.run(&args.window.site, window).await?)
            }
            Commands::Forecast { command } => self.execute_forecast(command).await,
            Commands::Sites => print_json(&self.query().list_sites().await?),
            Commands::Hourly { site, hours } => {
                print_json(&self.query().hourly_window(&site, hours).await?)
            }
            Commands::Raw { site, hours } => {
                print_json(&self.query().raw_window(&site, hours).await?)
            }
            Commands::Health { site } => print_json(&self.query().site_health(&site).await?),
            Commands::Summary => print_json(&self.query().summary().await?),
            Commands::System { .. } => {
                anyhow::bail!("system commands run without an initialized store")
            }
        }
    }

    async fn execute_forecast(&self, command: ForecastCommands) -> Result<()> {
        let store = ForecastStore::new(self.database.clone());
        match command {
            ForecastCommands::Put {
                site,
                ts,
                model,
                var,
                horizon,
                yhat,
                lower,
                upper,
            } => {
                let input = ForecastInput {
                    site,
                    ts: parse_iso_timestamp(&ts)
                        .map_err(|e| anyhow::anyhow!("Invalid --ts: {}", e))?,
                    model,
                    var,
                    horizon,
                    yhat,
                    yhat_lower: lower,
                    yhat_upper: upper,
                };
                print_json(&store.store_forecast(&input).await?)
            }
            ForecastCommands::Import { file } => {
                let inputs: Vec<ForecastInput> = read_json(&file).await?;
                let stored = store.store_forecasts(&inputs).await?;
                print_json(&serde_json::json!({ "stored": stored }))
            }
            ForecastCommands::List(args) => {
                let window = parse_window(&args)?;
                print_json(&store.forecasts_in(&args.site, window).await?)
            }
        }
    }

    fn query(&self) -> QueryService {
        QueryService::new(self.database.clone())
    }

    async fn weather_source(&self, args: &IngestArgs) -> Result<Arc<dyn WeatherSource>> {
        match &args.replay {
            Some(path) => {
                let payload: serde_json::Value = read_json(path).await?;
                let source = StaticSource::from_power_json(&payload)
                    .with_context(|| format!("Failed to parse replay file: {}", path.display()))?;
                tracing::info!(path = %path.display(), "Replaying captured source response");
                Ok(Arc::new(source))
            }
            None => Ok(Arc::new(
                NasaPowerSource::new(&self.config.source)
                    .context("Failed to build weather source client")?,
            )),
        }
    }

    fn handle_system_command(cmd: SystemCommands, cli: &CliConfig) -> Result<()> {
        match cmd {
            SystemCommands::Prune { yes } => Self::prune_data(cli, yes),
        }
    }

    fn prune_data(cli: &CliConfig, skip_confirm: bool) -> Result<()> {
        let data_dir = AppStorage::resolve_data_dir(cli.data_dir.as_deref());

        if !data_dir.exists() {
            println!(
                "Nothing to prune. Data directory does not exist: {}",
                data_dir.display()
            );
            return Ok(());
        }

        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        println!("This will permanently delete the local data directory:");
        println!("  {}", data_dir.display());
        println!();
        println!("Make sure no pipeline command is running against it.");

        if !skip_confirm {
            print!("\nContinue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Aborted.");
                return Ok(());
            }
        }

        std::fs::remove_dir_all(&data_dir)
            .with_context(|| format!("Failed to delete data directory: {}", data_dir.display()))?;
        println!("Pruned: {}", data_dir.display());
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        // stdout carries the JSON reports
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}

fn parse_window(args: &WindowArgs) -> Result<HourWindow> {
    Ok(HourWindow::parse_dates(&args.start, &args.end)?)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
