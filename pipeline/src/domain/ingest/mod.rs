//! Bronze ingestion
//!
//! Splits the window into fetch units, fetches each with bounded retry,
//! normalizes the observations and upserts them into `raw_weather`. A unit
//! that keeps failing is skipped (its hours are reported) and the batch
//! continues.

mod memory;
mod nasa;
mod source;

pub use memory::StaticSource;
pub use nasa::{NasaPowerSource, parse_power_json};
pub use source::{SourceError, SourceObservation, WeatherSource};

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use super::error::PipelineError;
use super::window::HourWindow;
use crate::core::config::{SiteCatalog, SourceConfig};
use crate::core::constants::{GHI_MIN_WM2, TEMP_MAX_C, TEMP_MIN_C, WIND_MIN_MPS};
use crate::data::sqlite::repositories::upsert_raw;
use crate::data::{RawWeatherRecord, SqliteService};
use crate::utils::retry::retry_with_backoff_async;
use crate::utils::time::truncate_to_hour;

/// Retry budget and fetch unit size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub chunk_hours: i64,
}

impl FetchPolicy {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            chunk_hours: i64::from(config.chunk_days) * 24,
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub site: String,
    pub window: HourWindow,
    pub upserted_count: u64,
    /// Hours with no stored observation from this run, ascending
    pub skipped_hours: Vec<DateTime<Utc>>,
    pub fetch_units: u64,
    pub failed_units: u64,
    pub cancelled: bool,
}

pub struct Ingestor {
    db: Arc<SqliteService>,
    source: Arc<dyn WeatherSource>,
    sites: Arc<SiteCatalog>,
    policy: FetchPolicy,
    shutdown_rx: Option<watch::Receiver<bool>>,
}

impl Ingestor {
    pub fn new(
        db: Arc<SqliteService>,
        source: Arc<dyn WeatherSource>,
        sites: Arc<SiteCatalog>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            db,
            source,
            sites,
            policy,
            shutdown_rx: None,
        }
    }

    /// Stop issuing fetches once the receiver reads `true`
    pub fn with_shutdown(mut self, shutdown_rx: watch::Receiver<bool>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub async fn ingest(
        &self,
        site: &str,
        window: HourWindow,
    ) -> Result<IngestReport, PipelineError> {
        let site_config = self
            .sites
            .get(site)
            .ok_or_else(|| PipelineError::missing_site(site))?;

        let mut report = IngestReport {
            site: site.to_string(),
            window,
            upserted_count: 0,
            skipped_hours: Vec::new(),
            fetch_units: 0,
            failed_units: 0,
            cancelled: false,
        };

        let ingested_at = Utc::now();
        let source = self.source.as_ref();

        for unit in window.chunks(self.policy.chunk_hours) {
            if report.cancelled || self.shutdown_requested() {
                report.cancelled = true;
                report.skipped_hours.extend(unit.iter_hours());
                continue;
            }

            report.fetch_units += 1;
            let unit_ref = &unit;
            let result = retry_with_backoff_async(
                self.policy.max_attempts,
                self.policy.base_delay_ms,
                move || source.fetch(site_config, unit_ref),
            )
            .await;

            let observations = match result {
                Ok((observations, attempts)) => {
                    tracing::debug!(
                        site = %site,
                        unit_start = %unit.start(),
                        observations = observations.len(),
                        attempts,
                        "Fetched unit"
                    );
                    observations
                }
                Err((e, attempts)) => {
                    tracing::warn!(
                        site = %site,
                        source = source.name(),
                        unit_start = %unit.start(),
                        unit_end = %unit.end(),
                        attempts,
                        error = %e,
                        "Fetch unit failed, skipping its hours"
                    );
                    report.failed_units += 1;
                    report.skipped_hours.extend(unit.iter_hours());
                    continue;
                }
            };

            let mut covered = BTreeSet::new();
            for observation in observations {
                if !unit.contains(observation.ts) {
                    continue;
                }
                let observed = observation.ts;
                let Some(record) = normalize_observation(site, observation, ingested_at) else {
                    tracing::warn!(
                        site = %site,
                        ts = %observed,
                        "Skipping observation with sub-second timestamp"
                    );
                    continue;
                };
                match upsert_raw(self.db.pool(), &record).await {
                    Ok(()) => {
                        report.upserted_count += 1;
                        covered.insert(truncate_to_hour(record.ts));
                    }
                    Err(e) if e.is_constraint_violation() => {
                        tracing::error!(
                            site = %site,
                            ts = %record.ts,
                            error = %e,
                            "Store rejected raw observation"
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            report
                .skipped_hours
                .extend(unit.iter_hours().filter(|h| !covered.contains(h)));
        }

        if report.cancelled {
            tracing::warn!(site = %site, "Ingest cancelled, remaining units not fetched");
        }

        tracing::info!(
            site = %site,
            upserted = report.upserted_count,
            skipped = report.skipped_hours.len(),
            failed_units = report.failed_units,
            "Ingest complete"
        );

        Ok(report)
    }
}

/// Keep a value only if it is finite and inside `[min, max]`
fn within(value: Option<f64>, min: f64, max: f64) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= min && *v <= max)
}

/// Map a source observation onto a Bronze row
///
/// Out-of-bounds values become null; the payload is kept verbatim. Returns
/// `None` when `ts` has a sub-second part, which the store cannot hold.
pub fn normalize_observation(
    site: &str,
    observation: SourceObservation,
    ingested_at: DateTime<Utc>,
) -> Option<RawWeatherRecord> {
    if observation.ts.timestamp_subsec_nanos() != 0 {
        return None;
    }
    Some(RawWeatherRecord {
        site: site.to_string(),
        ts: observation.ts,
        ghi_wm2: within(observation.ghi_wm2, GHI_MIN_WM2, f64::INFINITY),
        temp_c: within(observation.temp_c, TEMP_MIN_C, TEMP_MAX_C),
        wind_mps: within(observation.wind_mps, WIND_MIN_MPS, f64::INFINITY),
        raw_payload: observation.payload,
        ingested_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{PowerCurveRamp, SiteConfig, WindCurveConfig};
    use crate::data::sqlite::memory_pool;
    use crate::data::sqlite::repositories::list_raw_window;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn hour(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn sites() -> Arc<SiteCatalog> {
        let site = SiteConfig {
            lat: 41.88,
            lon: -87.63,
            pv_capacity_mw: 10.0,
            wind_capacity_mw: 5.0,
            performance_ratio: 0.8,
            wind_curve: WindCurveConfig {
                cut_in_mps: 3.0,
                rated_mps: 12.0,
                cut_out_mps: 25.0,
                ramp: PowerCurveRamp::Cubic,
            },
        };
        Arc::new([("S1".to_string(), site)].into_iter().collect())
    }

    fn obs(ts: DateTime<Utc>, ghi: Option<f64>) -> SourceObservation {
        SourceObservation {
            ts,
            ghi_wm2: ghi,
            temp_c: Some(12.0),
            wind_mps: Some(6.0),
            payload: json!({ "source": "TEST", "ghi_wm2": ghi }),
        }
    }

    fn policy(chunk_hours: i64) -> FetchPolicy {
        FetchPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            chunk_hours,
        }
    }

    async fn ingestor(
        source: Arc<StaticSource>,
        chunk_hours: i64,
    ) -> (Ingestor, Arc<SqliteService>) {
        let db = Arc::new(SqliteService::from_pool(memory_pool().await));
        let ingestor = Ingestor::new(db.clone(), source, sites(), policy(chunk_hours));
        (ingestor, db)
    }

    #[test]
    fn test_normalize_nulls_out_of_bounds() {
        let observation = SourceObservation {
            ts: hour(1, 0),
            ghi_wm2: Some(-999.0),
            temp_c: Some(81.0),
            wind_mps: Some(f64::NAN),
            payload: json!({ "ghi_wm2": -999.0 }),
        };
        let record = normalize_observation("S1", observation, hour(2, 0)).unwrap();
        assert_eq!(record.ghi_wm2, None);
        assert_eq!(record.temp_c, None);
        assert_eq!(record.wind_mps, None);
        assert_eq!(record.raw_payload["ghi_wm2"], -999.0);

        let edge = SourceObservation {
            ts: hour(1, 0),
            ghi_wm2: Some(0.0),
            temp_c: Some(-80.0),
            wind_mps: Some(0.0),
            payload: json!({}),
        };
        let record = normalize_observation("S1", edge, hour(2, 0)).unwrap();
        assert_eq!(record.ghi_wm2, Some(0.0));
        assert_eq!(record.temp_c, Some(-80.0));
        assert_eq!(record.wind_mps, Some(0.0));
    }

    #[tokio::test]
    async fn test_ingest_three_hours_and_rerun() {
        let source = Arc::new(StaticSource::new(vec![
            obs(hour(1, 0), Some(100.0)),
            obs(hour(1, 1), Some(200.0)),
            obs(hour(1, 2), None),
        ]));
        let (ingestor, db) = ingestor(source, 24).await;
        let window = HourWindow::new(hour(1, 0), hour(1, 2)).unwrap();

        let report = ingestor.ingest("S1", window).await.unwrap();
        assert_eq!(report.upserted_count, 3);
        assert!(report.skipped_hours.is_empty());
        let first = list_raw_window(db.pool(), "S1", hour(1, 0), hour(1, 3)).await.unwrap();

        ingestor.ingest("S1", window).await.unwrap();
        let second = list_raw_window(db.pool(), "S1", hour(1, 0), hour(1, 3)).await.unwrap();
        assert_eq!(second.len(), 3);
        let values = |rows: &[RawWeatherRecord]| {
            rows.iter()
                .map(|r| (r.ts, r.ghi_wm2, r.temp_c, r.wind_mps, r.raw_payload.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(values(&first), values(&second));
    }

    #[tokio::test]
    async fn test_unknown_site_is_configuration_error() {
        let (ingestor, _db) = ingestor(Arc::new(StaticSource::default()), 24).await;
        let window = HourWindow::new(hour(1, 0), hour(1, 2)).unwrap();
        let err = ingestor.ingest("nowhere", window).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let source = Arc::new(StaticSource::new(vec![obs(hour(1, 0), Some(1.0))]).fail_next(2));
        let (ingestor, _db) = ingestor(source.clone(), 24).await;
        let window = HourWindow::new(hour(1, 0), hour(1, 0)).unwrap();

        let report = ingestor.ingest("S1", window).await.unwrap();
        assert_eq!(source.calls(), 3);
        assert_eq!(report.upserted_count, 1);
        assert_eq!(report.failed_units, 0);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max_attempts() {
        let source = Arc::new(StaticSource::new(vec![obs(hour(1, 0), Some(1.0))]).fail_next(10));
        let (ingestor, _db) = ingestor(source.clone(), 24).await;
        let window = HourWindow::new(hour(1, 0), hour(1, 1)).unwrap();

        let report = ingestor.ingest("S1", window).await.unwrap();
        assert_eq!(source.calls(), 3);
        assert_eq!(report.failed_units, 1);
        assert_eq!(report.skipped_hours, vec![hour(1, 0), hour(1, 1)]);
    }

    #[tokio::test]
    async fn test_failed_unit_skips_only_its_hours() {
        let observations = (0..4).map(|h| obs(hour(1, h), Some(10.0))).collect();
        let source = Arc::new(StaticSource::new(observations).fail_unit(hour(1, 1)));
        let (ingestor, db) = ingestor(source, 1).await;
        let window = HourWindow::new(hour(1, 0), hour(1, 3)).unwrap();

        let report = ingestor.ingest("S1", window).await.unwrap();
        assert_eq!(report.fetch_units, 4);
        assert_eq!(report.failed_units, 1);
        assert_eq!(report.skipped_hours, vec![hour(1, 1)]);
        assert_eq!(report.upserted_count, 3);
        assert_eq!(
            list_raw_window(db.pool(), "S1", hour(1, 0), hour(1, 4)).await.unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn test_uncovered_hours_and_outside_observations() {
        // Whole-day response: hour 5 is outside the window, hour 1 is missing
        let source = Arc::new(StaticSource::new(vec![
            obs(hour(1, 0), Some(1.0)),
            obs(hour(1, 2), Some(1.0)),
            obs(hour(1, 5), Some(1.0)),
        ]));
        let (ingestor, db) = ingestor(source, 24).await;
        let window = HourWindow::new(hour(1, 0), hour(1, 2)).unwrap();

        let report = ingestor.ingest("S1", window).await.unwrap();
        assert_eq!(report.upserted_count, 2);
        assert_eq!(report.skipped_hours, vec![hour(1, 1)]);
        assert!(
            list_raw_window(db.pool(), "S1", hour(1, 5), hour(1, 6))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_misaligned_observation_is_stored() {
        let odd = hour(1, 1) + Duration::minutes(30);
        let source = Arc::new(StaticSource::new(vec![obs(odd, Some(1.0))]));
        let (ingestor, db) = ingestor(source, 24).await;
        let window = HourWindow::new(hour(1, 1), hour(1, 1)).unwrap();

        let report = ingestor.ingest("S1", window).await.unwrap();
        assert!(report.skipped_hours.is_empty());
        let rows = list_raw_window(db.pool(), "S1", hour(1, 1), hour(1, 2)).await.unwrap();
        assert_eq!(rows[0].ts, odd);
    }

    #[tokio::test]
    async fn test_sub_second_observation_is_skipped() {
        let jittered = hour(1, 1) + Duration::milliseconds(500);
        let source = Arc::new(StaticSource::new(vec![
            obs(hour(1, 0), Some(1.0)),
            obs(jittered, Some(2.0)),
        ]));
        let (ingestor, db) = ingestor(source, 24).await;
        let window = HourWindow::new(hour(1, 0), hour(1, 1)).unwrap();

        let report = ingestor.ingest("S1", window).await.unwrap();
        assert_eq!(report.upserted_count, 1);
        assert_eq!(report.skipped_hours, vec![hour(1, 1)]);
        assert!(
            list_raw_window(db.pool(), "S1", hour(1, 1), hour(1, 2))
                .await
                .unwrap()
                .is_empty()
        );

        let clean = crate::domain::Cleaner::new(db).clean("S1", window).await.unwrap();
        assert_eq!(clean.raw_count, 1);
        assert_eq!(clean.kept_count, 1);
    }

    #[test]
    fn test_normalize_rejects_sub_second_ts() {
        let observation = obs(hour(1, 0) + Duration::milliseconds(500), Some(1.0));
        assert!(normalize_observation("S1", observation, hour(2, 0)).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_fetching() {
        let source = Arc::new(StaticSource::new(vec![obs(hour(1, 0), Some(1.0))]));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        let (ingestor, _db) = ingestor(source.clone(), 1).await;
        let ingestor = ingestor.with_shutdown(shutdown_rx);
        let window = HourWindow::new(hour(1, 0), hour(1, 1)).unwrap();

        let report = ingestor.ingest("S1", window).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(source.calls(), 0);
        assert_eq!(report.fetch_units, 0);
        assert_eq!(report.skipped_hours, vec![hour(1, 0), hour(1, 1)]);
    }
}
