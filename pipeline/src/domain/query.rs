//! Read-only accessors for the serving layer
//!
//! Nothing here writes to the store.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use super::error::PipelineError;
use crate::core::constants::QUERY_MAX_HOURS;
use crate::data::sqlite::repositories::{
    layer_summary, list_recent_fact, list_recent_raw, list_sites,
};
use crate::data::{FactWeatherRecord, Layer, LayerSummary, RawWeatherRecord, SqliteService};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteHealth {
    pub site: String,
    pub raw: LayerSummary,
    pub fact: LayerSummary,
    /// Raw rows without a Silver counterpart
    pub dropped_rows: i64,
    /// Share of raw rows that reached Silver; `None` without raw rows
    pub kept_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub layers: Vec<LayerSummary>,
}

pub struct QueryService {
    db: Arc<SqliteService>,
}

fn check_hours(hours: u32) -> Result<u32, PipelineError> {
    if (1..=QUERY_MAX_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(PipelineError::InvalidArgument(format!(
            "hours must be between 1 and {}, got {}",
            QUERY_MAX_HOURS, hours
        )))
    }
}

impl QueryService {
    pub fn new(db: Arc<SqliteService>) -> Self {
        Self { db }
    }

    /// Distinct sites present in Bronze
    pub async fn list_sites(&self) -> Result<BTreeSet<String>, PipelineError> {
        Ok(list_sites(self.db.pool()).await?.into_iter().collect())
    }

    /// Most recent `hours` Silver rows, newest first
    pub async fn hourly_window(
        &self,
        site: &str,
        hours: u32,
    ) -> Result<Vec<FactWeatherRecord>, PipelineError> {
        let hours = check_hours(hours)?;
        Ok(list_recent_fact(self.db.pool(), site, hours).await?)
    }

    /// Most recent `hours` Bronze rows, newest first
    pub async fn raw_window(
        &self,
        site: &str,
        hours: u32,
    ) -> Result<Vec<RawWeatherRecord>, PipelineError> {
        let hours = check_hours(hours)?;
        Ok(list_recent_raw(self.db.pool(), site, hours).await?)
    }

    pub async fn site_health(&self, site: &str) -> Result<SiteHealth, PipelineError> {
        let pool = self.db.pool();
        let raw = layer_summary(pool, Layer::Raw, Some(site)).await?;
        let fact = layer_summary(pool, Layer::Fact, Some(site)).await?;

        let dropped_rows = (raw.row_count - fact.row_count).max(0);
        let kept_percentage = (raw.row_count > 0)
            .then(|| fact.row_count as f64 / raw.row_count as f64 * 100.0);

        Ok(SiteHealth {
            site: site.to_string(),
            raw,
            fact,
            dropped_rows,
            kept_percentage,
        })
    }

    /// Row count and latest ts for every layer
    pub async fn summary(&self) -> Result<Summary, PipelineError> {
        let mut layers = Vec::with_capacity(Layer::ALL.len());
        for layer in Layer::ALL {
            layers.push(layer_summary(self.db.pool(), layer, None).await?);
        }
        Ok(Summary { layers })
    }
}
