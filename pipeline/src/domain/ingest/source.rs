//! External weather source seam

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::config::SiteConfig;
use crate::domain::window::HourWindow;

/// One observation exactly as the source reported it
///
/// Values are not range-checked here; the ingestor decides what Bronze keeps.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceObservation {
    pub ts: DateTime<Utc>,
    pub ghi_wm2: Option<f64>,
    pub temp_c: Option<f64>,
    pub wind_mps: Option<f64>,
    /// Audit document stored verbatim in `raw_weather.raw_payload`
    pub payload: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source responded with status {0}")]
    Status(u16),

    #[error("Source timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to parse source response: {0}")]
    Parse(String),
}

/// Provider of hourly observations for a site
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch observations covering `window` for the site's coordinates
    ///
    /// May return observations outside the window, or none for some hours.
    async fn fetch(
        &self,
        site: &SiteConfig,
        window: &HourWindow,
    ) -> Result<Vec<SourceObservation>, SourceError>;
}
