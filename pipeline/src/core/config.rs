use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_SOURCE_BASE_DELAY_MS, DEFAULT_SOURCE_CHUNK_DAYS,
    DEFAULT_SOURCE_MAX_ATTEMPTS, DEFAULT_SOURCE_TIMEOUT_SECS, DEFAULT_SOURCE_URL,
    SQLITE_BUSY_TIMEOUT_SECS, SQLITE_MAX_CONNECTIONS,
};

// =============================================================================
// Wind Power Curve
// =============================================================================

/// Shape of the power curve between cut-in and rated wind speed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerCurveRamp {
    /// Output grows linearly with wind speed
    Linear,
    /// Output grows with the cube of wind speed (kinetic power)
    #[default]
    Cubic,
}

impl fmt::Display for PowerCurveRamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerCurveRamp::Linear => write!(f, "linear"),
            PowerCurveRamp::Cubic => write!(f, "cubic"),
        }
    }
}

/// Turbine power curve, expressed in wind speeds (m/s)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct WindCurveConfig {
    pub cut_in_mps: f64,
    pub rated_mps: f64,
    pub cut_out_mps: f64,
    #[serde(default)]
    pub ramp: PowerCurveRamp,
}

impl WindCurveConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let speeds = [self.cut_in_mps, self.rated_mps, self.cut_out_mps];
        if speeds.iter().any(|v| !v.is_finite()) {
            return Err("wind_curve speeds must be finite".to_string());
        }
        if self.cut_in_mps < 0.0 {
            return Err("wind_curve.cut_in_mps must be >= 0".to_string());
        }
        if self.cut_in_mps >= self.rated_mps {
            return Err("wind_curve.cut_in_mps must be below rated_mps".to_string());
        }
        if self.rated_mps > self.cut_out_mps {
            return Err("wind_curve.rated_mps must not exceed cut_out_mps".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Site Assumptions
// =============================================================================

/// Per-site capacity and conversion assumptions
///
/// Treated as external configuration: the pipeline never infers these.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SiteConfig {
    pub lat: f64,
    pub lon: f64,
    pub pv_capacity_mw: f64,
    pub wind_capacity_mw: f64,
    pub performance_ratio: f64,
    pub wind_curve: WindCurveConfig,
}

impl SiteConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(format!("lat {} is outside [-90, 90]", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(format!("lon {} is outside [-180, 180]", self.lon));
        }
        if !(self.pv_capacity_mw.is_finite() && self.pv_capacity_mw > 0.0) {
            return Err("pv_capacity_mw must be greater than 0".to_string());
        }
        if !(self.wind_capacity_mw.is_finite() && self.wind_capacity_mw > 0.0) {
            return Err("wind_capacity_mw must be greater than 0".to_string());
        }
        if !(self.performance_ratio > 0.0 && self.performance_ratio <= 1.0) {
            return Err("performance_ratio must be in (0, 1]".to_string());
        }
        self.wind_curve.validate()
    }
}

/// Site assumptions keyed by site name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SiteCatalog {
    sites: BTreeMap<String, SiteConfig>,
}

impl SiteCatalog {
    pub fn new(sites: BTreeMap<String, SiteConfig>) -> Self {
        Self { sites }
    }

    pub fn get(&self, site: &str) -> Option<&SiteConfig> {
        self.sites.get(site)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    fn validate(&self) -> Result<()> {
        for (name, site) in &self.sites {
            if name.trim().is_empty() {
                anyhow::bail!("Configuration error: site names must not be empty");
            }
            site.validate()
                .map_err(|e| anyhow::anyhow!("Configuration error: sites.{}: {}", name, e))?;
        }
        Ok(())
    }
}

impl FromIterator<(String, SiteConfig)> for SiteCatalog {
    fn from_iter<I: IntoIterator<Item = (String, SiteConfig)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Database configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    pub busy_timeout_secs: Option<u64>,
    pub max_connections: Option<u32>,
}

/// Weather source configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SourceFileConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub chunk_days: Option<u32>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub database: Option<DatabaseFileConfig>,
    pub source: Option<SourceFileConfig>,
    pub sites: Option<BTreeMap<String, SiteConfig>>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    ///
    /// Sites are replaced whole, by name.
    fn merge(&mut self, other: FileConfig) {
        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(DatabaseFileConfig::default);
            if database.busy_timeout_secs.is_some() {
                current.busy_timeout_secs = database.busy_timeout_secs;
            }
            if database.max_connections.is_some() {
                current.max_connections = database.max_connections;
            }
        }

        if let Some(source) = other.source {
            let current = self.source.get_or_insert_with(SourceFileConfig::default);
            if source.base_url.is_some() {
                tracing::trace!(base_url = ?source.base_url, "Merging source.base_url");
                current.base_url = source.base_url;
            }
            if source.timeout_secs.is_some() {
                current.timeout_secs = source.timeout_secs;
            }
            if source.max_attempts.is_some() {
                current.max_attempts = source.max_attempts;
            }
            if source.base_delay_ms.is_some() {
                current.base_delay_ms = source.base_delay_ms;
            }
            if source.chunk_days.is_some() {
                current.chunk_days = source.chunk_days;
            }
        }

        if let Some(sites) = other.sites {
            let current = self.sites.get_or_insert_with(BTreeMap::new);
            for (name, site) in sites {
                tracing::trace!(site = %name, "Merging site assumptions");
                current.insert(name, site);
            }
        }
    }
}

// =============================================================================
// Resolved Config Structs
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub busy_timeout_secs: u64,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_secs: SQLITE_BUSY_TIMEOUT_SECS,
            max_connections: SQLITE_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub chunk_days: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_URL.to_string(),
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
            max_attempts: DEFAULT_SOURCE_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_SOURCE_BASE_DELAY_MS,
            chunk_days: DEFAULT_SOURCE_CHUNK_DAYS,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub sites: SiteCatalog,
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.climate/climate.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        Self::resolve(file_config, cli)
    }

    /// Layer defaults -> file config -> CLI/env overrides, then validate
    fn resolve(file_config: FileConfig, cli: &CliConfig) -> Result<Self> {
        let file_database = file_config.database.unwrap_or_default();
        let file_source = file_config.source.unwrap_or_default();
        let defaults_db = DatabaseConfig::default();
        let defaults_source = SourceConfig::default();

        let database = DatabaseConfig {
            busy_timeout_secs: file_database
                .busy_timeout_secs
                .unwrap_or(defaults_db.busy_timeout_secs),
            max_connections: file_database
                .max_connections
                .unwrap_or(defaults_db.max_connections),
        };

        let source = SourceConfig {
            base_url: cli
                .source_url
                .clone()
                .or(file_source.base_url)
                .unwrap_or(defaults_source.base_url),
            timeout_secs: cli
                .source_timeout_secs
                .or(file_source.timeout_secs)
                .unwrap_or(defaults_source.timeout_secs),
            max_attempts: cli
                .source_max_attempts
                .or(file_source.max_attempts)
                .unwrap_or(defaults_source.max_attempts),
            base_delay_ms: file_source
                .base_delay_ms
                .unwrap_or(defaults_source.base_delay_ms),
            chunk_days: cli
                .source_chunk_days
                .or(file_source.chunk_days)
                .unwrap_or(defaults_source.chunk_days),
        };

        let sites = SiteCatalog::new(file_config.sites.unwrap_or_default());

        let config = Self {
            database,
            source,
            sites,
            data_dir: cli.data_dir.clone(),
        };

        config.validate()?;

        tracing::debug!(
            source_url = %config.source.base_url,
            source_timeout_secs = config.source.timeout_secs,
            source_max_attempts = config.source.max_attempts,
            source_chunk_days = config.source.chunk_days,
            sites = config.sites.len(),
            data_dir = ?config.data_dir,
            "Configuration loaded"
        );
        if config.sites.is_empty() {
            tracing::warn!("No sites configured; ingest, features and KPIs will reject every site");
        } else {
            tracing::debug!(
                sites = ?config.sites.names().collect::<Vec<_>>(),
                "Site assumptions loaded"
            );
        }

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            anyhow::bail!("Configuration error: database.max_connections must be greater than 0");
        }
        if self.source.base_url.trim().is_empty() {
            anyhow::bail!("Configuration error: source.base_url must not be empty");
        }
        if self.source.timeout_secs == 0 {
            anyhow::bail!("Configuration error: source.timeout_secs must be greater than 0");
        }
        if self.source.max_attempts == 0 {
            anyhow::bail!("Configuration error: source.max_attempts must be at least 1");
        }
        if self.source.chunk_days == 0 {
            anyhow::bail!("Configuration error: source.chunk_days must be at least 1");
        }
        self.sites.validate()
    }
}

/// Get the profile config path (~/.climate/climate.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}
