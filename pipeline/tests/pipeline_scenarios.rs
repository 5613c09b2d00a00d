//! End-to-end runs against an on-disk database

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use climate_pipeline::core::config::{
    DatabaseConfig, PowerCurveRamp, SiteCatalog, SiteConfig, WindCurveConfig,
};
use climate_pipeline::data::sqlite::repositories::{
    layer_summary, list_fact_window, list_feature_window, list_kpi_window, list_raw_window,
};
use climate_pipeline::data::{KpiRecord, Layer, SqliteService};
use climate_pipeline::domain::{
    Cleaner, DropReason, FeatureComputer, FetchPolicy, ForecastInput, ForecastStore, HourWindow,
    Ingestor, KpiComputer, PipelineError, QueryService, SourceObservation, StaticSource,
};
use climate_pipeline::utils::time::truncate_to_hour;

fn hour(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap()
}

fn sites() -> Arc<SiteCatalog> {
    let s1 = SiteConfig {
        lat: 41.8781,
        lon: -87.6298,
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
    Arc::new([("S1".to_string(), s1)].into_iter().collect())
}

fn observations() -> Vec<SourceObservation> {
    [Some(100.0), Some(200.0), None]
        .into_iter()
        .zip(0u32..)
        .map(|(ghi, h)| SourceObservation {
            ts: hour(h),
            ghi_wm2: ghi,
            temp_c: Some(21.5),
            wind_mps: Some(6.0),
            payload: json!({
                "source": "NASA_POWER",
                "ghi_wm2": ghi,
                "t2m_c": 21.5,
                "ws10_mps": 6.0
            }),
        })
        .collect()
}

async fn open(dir: &TempDir) -> Arc<SqliteService> {
    let path = dir.path().join("sqlite").join("climate.db");
    Arc::new(
        SqliteService::init_at(&path, &DatabaseConfig::default())
            .await
            .unwrap(),
    )
}

fn policy() -> FetchPolicy {
    FetchPolicy {
        max_attempts: 2,
        base_delay_ms: 1,
        chunk_hours: 24,
    }
}

fn window() -> HourWindow {
    HourWindow::new(hour(0), hour(2)).unwrap()
}

fn ingestor(db: &Arc<SqliteService>, sites: Arc<SiteCatalog>) -> Ingestor {
    let source = Arc::new(StaticSource::new(observations()));
    Ingestor::new(db.clone(), source, sites, policy())
}

#[tokio::test]
async fn test_ingest_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let ingestor = ingestor(&db, sites());

    let first = ingestor.ingest("S1", window()).await.unwrap();
    assert_eq!(first.upserted_count, 3);
    assert!(first.skipped_hours.is_empty());
    let before = list_raw_window(db.pool(), "S1", hour(0), hour(3)).await.unwrap();

    ingestor.ingest("S1", window()).await.unwrap();
    let after = list_raw_window(db.pool(), "S1", hour(0), hour(3)).await.unwrap();

    assert_eq!(after.len(), 3);
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(
            (a.ts, a.ghi_wm2, a.temp_c, a.wind_mps),
            (b.ts, b.ghi_wm2, b.temp_c, b.wind_mps)
        );
        assert_eq!(a.raw_payload, b.raw_payload);
    }
    assert_eq!(after[2].ghi_wm2, None);
}

#[tokio::test]
async fn test_clean_after_ingest() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let ingestor = ingestor(&db, sites());
    ingestor.ingest("S1", window()).await.unwrap();

    let report = Cleaner::new(db.clone()).clean("S1", window()).await.unwrap();
    assert_eq!(report.kept_count, 2);
    assert_eq!(report.drop_reasons.len(), 1);
    assert_eq!(report.drop_reasons[&DropReason::NullGhi], 1);
    assert_eq!(report.kept_count + report.dropped(), report.raw_count);
    assert_eq!(
        serde_json::to_value(&report.drop_reasons).unwrap(),
        json!({ "null_ghi": 1 })
    );

    let facts = list_fact_window(db.pool(), "S1", hour(0), hour(3)).await.unwrap();
    assert_eq!(facts.len(), 2);
    for fact in &facts {
        assert_eq!(truncate_to_hour(fact.ts), fact.ts);
        assert!(fact.ghi_wm2 >= 0.0 && fact.wind_mps >= 0.0);
        assert!((-80.0..=80.0).contains(&fact.temp_c));
    }

    // Bronze keeps the rejected row and its payload
    let raw = list_raw_window(db.pool(), "S1", hour(2), hour(3)).await.unwrap();
    assert_eq!(raw[0].raw_payload["ghi_wm2"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_features_and_kpis() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let sites = sites();
    ingestor(&db, sites.clone())
        .ingest("S1", window())
        .await
        .unwrap();
    Cleaner::new(db.clone()).clean("S1", window()).await.unwrap();

    let features = FeatureComputer::new(db.clone(), sites.clone());
    let feature_report = features.compute_features("S1", window()).await.unwrap();
    assert_eq!(feature_report.feature_count, 2);
    let kpis = KpiComputer::new(db.clone(), sites.clone());
    assert_eq!(kpis.compute_kpis("S1", window()).await.unwrap().kpi_count, 2);

    let feature_rows = list_feature_window(db.pool(), "S1", hour(0), hour(1))
        .await
        .unwrap();
    assert!((feature_rows[0].ghi_kwh_m2 - 0.1).abs() < 1e-12);
    assert!((feature_rows[0].pv_est_mwh - 0.8).abs() < 1e-12);

    let kpi_rows = list_kpi_window(db.pool(), "S1", hour(0), hour(3))
        .await
        .unwrap();
    assert!((kpi_rows[0].pv_cf - 0.08).abs() < 1e-12);
    assert!(
        kpi_rows
            .iter()
            .all(|k| (0.0..=1.2).contains(&k.pv_cf) && (0.0..=1.2).contains(&k.wind_cf))
    );

    // Same inputs, same outputs
    kpis.compute_kpis("S1", window()).await.unwrap();
    let again = list_kpi_window(db.pool(), "S1", hour(0), hour(3))
        .await
        .unwrap();
    let cfs = |rows: &[KpiRecord]| rows.iter().map(|k| (k.pv_cf, k.wind_cf)).collect::<Vec<_>>();
    assert_eq!(cfs(&kpi_rows), cfs(&again));
}

#[tokio::test]
async fn test_forecast_rejections_leave_store_untouched() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let store = ForecastStore::new(db.clone());
    let valid = ForecastInput {
        site: "S1".to_string(),
        ts: hour(12),
        model: "baseline".to_string(),
        var: "pv".to_string(),
        horizon: 24,
        yhat: 0.5,
        yhat_lower: 0.2,
        yhat_upper: 0.9,
    };

    for bad in [
        ForecastInput { horizon: 49, ..valid.clone() },
        ForecastInput { model: "arima".to_string(), ..valid.clone() },
    ] {
        let err = store.store_forecast(&bad).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidForecast { .. }));
    }
    let forecasts = layer_summary(db.pool(), Layer::Forecast, None).await.unwrap();
    assert_eq!(forecasts.row_count, 0);

    store.store_forecast(&valid).await.unwrap();
    store
        .store_forecast(&ForecastInput { yhat: 0.7, ..valid.clone() })
        .await
        .unwrap();
    let rows = store.forecasts_at("S1", hour(12)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].yhat, 0.7);
}

#[tokio::test]
async fn test_queries_after_run() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let sites = sites();
    ingestor(&db, sites)
        .ingest("S1", window())
        .await
        .unwrap();
    Cleaner::new(db.clone()).clean("S1", window()).await.unwrap();

    let query = QueryService::new(db.clone());
    assert!(query.list_sites().await.unwrap().contains("S1"));

    let hourly = query.hourly_window("S1", 24).await.unwrap();
    assert_eq!(hourly.len(), 2);
    assert_eq!(hourly[0].ts, hour(1));

    let health = query.site_health("S1").await.unwrap();
    assert_eq!(health.dropped_rows, 1);

    let summary = query.summary().await.unwrap();
    assert_eq!(summary.layers.len(), 5);
    assert_eq!(summary.layers[0].latest_ts, Some(hour(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_runs_converge() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir).await;
    let first = ingestor(&db, sites());
    let second = ingestor(&db, sites());

    let (a, b) = tokio::join!(first.ingest("S1", window()), second.ingest("S1", window()));
    assert_eq!(a.unwrap().upserted_count, 3);
    assert_eq!(b.unwrap().upserted_count, 3);

    let cleaner = Cleaner::new(db.clone());
    let (a, b) = tokio::join!(cleaner.clean("S1", window()), cleaner.clean("S1", window()));
    for report in [a.unwrap(), b.unwrap()] {
        assert_eq!(report.raw_count, 3);
        assert_eq!(report.kept_count, 2);
        assert_eq!(report.kept_count + report.dropped(), report.raw_count);
        assert!(report.is_complete());
    }

    let raw = layer_summary(db.pool(), Layer::Raw, Some("S1")).await.unwrap();
    let fact = layer_summary(db.pool(), Layer::Fact, Some("S1")).await.unwrap();
    assert_eq!(raw.row_count, 3);
    assert_eq!(fact.row_count, 2);
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir).await;
        ingestor(&db, sites())
            .ingest("S1", window())
            .await
            .unwrap();
        db.checkpoint().await.unwrap();
        db.close().await;
    }

    let db = open(&dir).await;
    let raw = layer_summary(db.pool(), Layer::Raw, Some("S1")).await.unwrap();
    assert_eq!(raw.row_count, 3);
}
