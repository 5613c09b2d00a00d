//! Gold features: irradiance energy and estimated generation
//!
//! All numeric work lives in [`derive_feature`]; the computer reads Silver
//! rows, maps them and upserts into `mart_features`.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::error::PipelineError;
use super::window::HourWindow;
use crate::core::config::{PowerCurveRamp, SiteCatalog, SiteConfig, WindCurveConfig};
use crate::core::constants::{INTERVAL_HOURS, WH_PER_KWH};
use crate::data::sqlite::repositories::{list_fact_window, upsert_feature};
use crate::data::{FactWeatherRecord, FeatureRecord, SqliteService};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureValues {
    pub ghi_kwh_m2: f64,
    pub pv_est_mwh: f64,
    pub wind_est_mwh: f64,
}

/// Share of rated output produced at wind speed `v` (m/s), in `[0, 1]`
pub fn wind_power_fraction(curve: &WindCurveConfig, v: f64) -> f64 {
    if !v.is_finite() || v < curve.cut_in_mps || v > curve.cut_out_mps {
        return 0.0;
    }
    if v >= curve.rated_mps {
        return 1.0;
    }

    let fraction = match curve.ramp {
        PowerCurveRamp::Linear => (v - curve.cut_in_mps) / (curve.rated_mps - curve.cut_in_mps),
        PowerCurveRamp::Cubic => {
            let cut_in = curve.cut_in_mps.powi(3);
            (v.powi(3) - cut_in) / (curve.rated_mps.powi(3) - cut_in)
        }
    };
    fraction.clamp(0.0, 1.0)
}

pub fn derive_feature(fact: &FactWeatherRecord, site: &SiteConfig) -> FeatureValues {
    let ghi_kwh_m2 = (fact.ghi_wm2 * INTERVAL_HOURS / WH_PER_KWH).max(0.0);
    let pv_est_mwh = (ghi_kwh_m2 * site.pv_capacity_mw * site.performance_ratio).max(0.0);
    let wind_est_mwh = wind_power_fraction(&site.wind_curve, fact.wind_mps)
        * site.wind_capacity_mw
        * INTERVAL_HOURS;

    FeatureValues {
        ghi_kwh_m2,
        pv_est_mwh,
        wind_est_mwh: wind_est_mwh.max(0.0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureReport {
    pub site: String,
    pub window: HourWindow,
    pub feature_count: u64,
    pub constraint_violations: u64,
}

pub struct FeatureComputer {
    db: Arc<SqliteService>,
    sites: Arc<SiteCatalog>,
}

impl FeatureComputer {
    pub fn new(db: Arc<SqliteService>, sites: Arc<SiteCatalog>) -> Self {
        Self { db, sites }
    }

    pub async fn compute_features(
        &self,
        site: &str,
        window: HourWindow,
    ) -> Result<FeatureReport, PipelineError> {
        let site_config = self
            .sites
            .get(site)
            .ok_or_else(|| PipelineError::missing_site(site))?;

        let pool = self.db.pool();
        let facts = list_fact_window(pool, site, window.start(), window.end_exclusive()).await?;

        let mut report = FeatureReport {
            site: site.to_string(),
            window,
            feature_count: 0,
            constraint_violations: 0,
        };

        let computed_at = Utc::now();
        for fact in &facts {
            let values = derive_feature(fact, site_config);
            let record = FeatureRecord {
                site: fact.site.clone(),
                ts: fact.ts,
                ghi_kwh_m2: values.ghi_kwh_m2,
                pv_est_mwh: values.pv_est_mwh,
                wind_est_mwh: values.wind_est_mwh,
                computed_at,
            };

            match upsert_feature(pool, &record).await {
                Ok(()) => report.feature_count += 1,
                Err(e) if e.is_constraint_violation() => {
                    tracing::error!(
                        site = %site,
                        ts = %record.ts,
                        error = %e,
                        "Store rejected feature row"
                    );
                    report.constraint_violations += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            site = %site,
            features = report.feature_count,
            constraint_violations = report.constraint_violations,
            "Features computed"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::memory_pool;
    use crate::data::sqlite::repositories::{list_feature_window, upsert_fact, upsert_raw};
    use crate::data::RawWeatherRecord;
    use chrono::{DateTime, TimeZone};
    use serde_json::json;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    fn curve(ramp: PowerCurveRamp) -> WindCurveConfig {
        WindCurveConfig {
            cut_in_mps: 3.0,
            rated_mps: 12.0,
            cut_out_mps: 25.0,
            ramp,
        }
    }

    fn site() -> SiteConfig {
        SiteConfig {
            lat: 41.88,
            lon: -87.63,
            pv_capacity_mw: 10.0,
            wind_capacity_mw: 5.0,
            performance_ratio: 0.8,
            wind_curve: curve(PowerCurveRamp::Cubic),
        }
    }

    fn fact(ts: DateTime<Utc>, ghi: f64, wind: f64) -> FactWeatherRecord {
        FactWeatherRecord {
            site: "S1".to_string(),
            ts,
            ghi_wm2: ghi,
            temp_c: 10.0,
            wind_mps: wind,
            cleaned_at: hour(23),
        }
    }

    #[test]
    fn test_pv_estimate() {
        let values = derive_feature(&fact(hour(12), 100.0, 0.0), &site());
        assert!((values.ghi_kwh_m2 - 0.1).abs() < 1e-12);
        assert!((values.pv_est_mwh - 0.8).abs() < 1e-12);
        assert_eq!(values.wind_est_mwh, 0.0);
    }

    #[test]
    fn test_wind_curve_boundaries() {
        for ramp in [PowerCurveRamp::Linear, PowerCurveRamp::Cubic] {
            let c = curve(ramp);
            assert_eq!(wind_power_fraction(&c, 0.0), 0.0);
            assert_eq!(wind_power_fraction(&c, 2.99), 0.0);
            assert_eq!(wind_power_fraction(&c, 3.0), 0.0);
            assert_eq!(wind_power_fraction(&c, 12.0), 1.0);
            assert_eq!(wind_power_fraction(&c, 25.0), 1.0);
            assert_eq!(wind_power_fraction(&c, 25.01), 0.0);
            assert_eq!(wind_power_fraction(&c, f64::NAN), 0.0);
        }
        assert!((wind_power_fraction(&curve(PowerCurveRamp::Linear), 7.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_wind_ramp_is_monotonic() {
        for ramp in [PowerCurveRamp::Linear, PowerCurveRamp::Cubic] {
            let c = curve(ramp);
            let mut previous = 0.0;
            for step in 0..=90 {
                let v = 3.0 + f64::from(step) * 0.1;
                let fraction = wind_power_fraction(&c, v);
                assert!(fraction >= previous, "{ramp} not monotonic at {v}");
                previous = fraction;
            }
        }
    }

    #[test]
    fn test_wind_estimate_at_rated() {
        let values = derive_feature(&fact(hour(0), 0.0, 15.0), &site());
        assert_eq!(values.wind_est_mwh, 5.0);
    }

    #[tokio::test]
    async fn test_compute_features_is_deterministic() {
        let db = Arc::new(SqliteService::from_pool(memory_pool().await));
        for (h, ghi, wind) in [(0, 0.0, 2.0), (1, 100.0, 8.0), (2, 650.0, 13.0)] {
            let raw = RawWeatherRecord {
                site: "S1".to_string(),
                ts: hour(h),
                ghi_wm2: Some(ghi),
                temp_c: Some(10.0),
                wind_mps: Some(wind),
                raw_payload: json!({}),
                ingested_at: hour(23),
            };
            upsert_raw(db.pool(), &raw).await.unwrap();
            upsert_fact(db.pool(), &fact(hour(h), ghi, wind)).await.unwrap();
        }
        let sites = Arc::new([("S1".to_string(), site())].into_iter().collect());
        let computer = FeatureComputer::new(db.clone(), sites);
        let window = HourWindow::new(hour(0), hour(2)).unwrap();

        let report = computer.compute_features("S1", window).await.unwrap();
        assert_eq!(report.feature_count, 3);
        let values = |rows: Vec<FeatureRecord>| {
            rows.into_iter()
                .map(|r| (r.ts, r.ghi_kwh_m2, r.pv_est_mwh, r.wind_est_mwh))
                .collect::<Vec<_>>()
        };
        let first = values(list_feature_window(db.pool(), "S1", hour(0), hour(3)).await.unwrap());
        computer.compute_features("S1", window).await.unwrap();
        let second = values(list_feature_window(db.pool(), "S1", hour(0), hour(3)).await.unwrap());
        assert_eq!(first, second);
        assert!((first[1].2 - 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_missing_site_writes_nothing() {
        let db = Arc::new(SqliteService::from_pool(memory_pool().await));
        let computer = FeatureComputer::new(db, Arc::new(SiteCatalog::default()));
        let window = HourWindow::new(hour(0), hour(2)).unwrap();
        let err = computer.compute_features("S1", window).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
