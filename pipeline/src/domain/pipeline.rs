//! Ingest → clean → features → KPIs for one site and window

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::clean::{CleanReport, Cleaner};
use super::error::PipelineError;
use super::features::{FeatureComputer, FeatureReport};
use super::ingest::{FetchPolicy, IngestReport, Ingestor, WeatherSource};
use super::kpi::{KpiComputer, KpiReport};
use super::window::HourWindow;
use crate::core::config::SiteCatalog;
use crate::data::SqliteService;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub ingest: IngestReport,
    pub clean: CleanReport,
    pub features: FeatureReport,
    pub kpis: KpiReport,
}

pub struct PipelineRunner {
    ingestor: Ingestor,
    cleaner: Cleaner,
    features: FeatureComputer,
    kpis: KpiComputer,
    sites: Arc<SiteCatalog>,
}

impl PipelineRunner {
    pub fn new(
        db: Arc<SqliteService>,
        source: Arc<dyn WeatherSource>,
        sites: Arc<SiteCatalog>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            ingestor: Ingestor::new(db.clone(), source, sites.clone(), policy),
            cleaner: Cleaner::new(db.clone()),
            features: FeatureComputer::new(db.clone(), sites.clone()),
            kpis: KpiComputer::new(db, sites.clone()),
            sites,
        }
    }

    pub fn with_shutdown(mut self, shutdown_rx: watch::Receiver<bool>) -> Self {
        self.ingestor = self.ingestor.with_shutdown(shutdown_rx);
        self
    }

    /// Later stages still run after a cancelled ingest, over what was committed
    pub async fn run(&self, site: &str, window: HourWindow) -> Result<RunReport, PipelineError> {
        // Fail before any fetch if the later stages could not run
        if self.sites.get(site).is_none() {
            return Err(PipelineError::missing_site(site));
        }

        let ingest = self.ingestor.ingest(site, window).await?;
        let clean = self.cleaner.clean(site, window).await?;
        let features = self.features.compute_features(site, window).await?;
        let kpis = self.kpis.compute_kpis(site, window).await?;

        tracing::info!(
            site = %site,
            upserted = ingest.upserted_count,
            kept = clean.kept_count,
            features = features.feature_count,
            kpis = kpis.kpi_count,
            "Pipeline run complete"
        );

        Ok(RunReport {
            ingest,
            clean,
            features,
            kpis,
        })
    }
}
