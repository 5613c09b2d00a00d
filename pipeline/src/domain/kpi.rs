//! Gold KPIs: capacity factors from estimated generation

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::error::PipelineError;
use super::window::HourWindow;
use crate::core::config::{SiteCatalog, SiteConfig};
use crate::core::constants::{CAPACITY_FACTOR_MAX, INTERVAL_HOURS};
use crate::data::sqlite::repositories::{list_feature_window, upsert_kpi};
use crate::data::{FeatureRecord, KpiRecord, SqliteService};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiValues {
    pub pv_cf: f64,
    pub wind_cf: f64,
}

/// Energy over one interval divided by nameplate energy, clamped to `[0, 1.2]`
fn capacity_factor(energy_mwh: f64, capacity_mw: f64) -> f64 {
    let cf = energy_mwh / (capacity_mw * INTERVAL_HOURS);
    if cf.is_finite() {
        cf.clamp(0.0, CAPACITY_FACTOR_MAX)
    } else {
        0.0
    }
}

pub fn derive_kpi(feature: &FeatureRecord, site: &SiteConfig) -> KpiValues {
    KpiValues {
        pv_cf: capacity_factor(feature.pv_est_mwh, site.pv_capacity_mw),
        wind_cf: capacity_factor(feature.wind_est_mwh, site.wind_capacity_mw),
    }
}

fn check_capacities(site: &str, config: &SiteConfig) -> Result<(), PipelineError> {
    for (name, value) in [
        ("pv_capacity_mw", config.pv_capacity_mw),
        ("wind_capacity_mw", config.wind_capacity_mw),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "site '{}': {} must be greater than 0, got {}",
                site, name, value
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    pub site: String,
    pub window: HourWindow,
    pub kpi_count: u64,
    pub constraint_violations: u64,
}

pub struct KpiComputer {
    db: Arc<SqliteService>,
    sites: Arc<SiteCatalog>,
}

impl KpiComputer {
    pub fn new(db: Arc<SqliteService>, sites: Arc<SiteCatalog>) -> Self {
        Self { db, sites }
    }

    pub async fn compute_kpis(
        &self,
        site: &str,
        window: HourWindow,
    ) -> Result<KpiReport, PipelineError> {
        let site_config = self
            .sites
            .get(site)
            .ok_or_else(|| PipelineError::missing_site(site))?;
        check_capacities(site, site_config)?;

        let pool = self.db.pool();
        let features =
            list_feature_window(pool, site, window.start(), window.end_exclusive()).await?;

        let mut report = KpiReport {
            site: site.to_string(),
            window,
            kpi_count: 0,
            constraint_violations: 0,
        };

        let computed_at = Utc::now();
        for feature in &features {
            let values = derive_kpi(feature, site_config);
            let record = KpiRecord {
                site: feature.site.clone(),
                ts: feature.ts,
                pv_capacity_mw: site_config.pv_capacity_mw,
                wind_capacity_mw: site_config.wind_capacity_mw,
                pv_cf: values.pv_cf,
                wind_cf: values.wind_cf,
                computed_at,
            };

            match upsert_kpi(pool, &record).await {
                Ok(()) => report.kpi_count += 1,
                Err(e) if e.is_constraint_violation() => {
                    tracing::error!(
                        site = %site,
                        ts = %record.ts,
                        error = %e,
                        "Store rejected KPI row"
                    );
                    report.constraint_violations += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            site = %site,
            kpis = report.kpi_count,
            constraint_violations = report.constraint_violations,
            "KPIs computed"
        );

        Ok(report)
    }
}
