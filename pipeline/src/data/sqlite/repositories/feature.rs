//! Gold repository: `mart_features`

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::FeatureRecord;
use crate::utils::time::secs_to_datetime;

type FeatureRow = (String, i64, f64, f64, f64, i64);

pub async fn upsert_feature(pool: &SqlitePool, record: &FeatureRecord) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO mart_features (site, ts, ghi_kwh_m2, pv_est_mwh, wind_est_mwh, computed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (site, ts) DO UPDATE SET
            ghi_kwh_m2 = excluded.ghi_kwh_m2,
            pv_est_mwh = excluded.pv_est_mwh,
            wind_est_mwh = excluded.wind_est_mwh,
            computed_at = excluded.computed_at
        "#,
    )
    .bind(&record.site)
    .bind(record.ts.timestamp())
    .bind(record.ghi_kwh_m2)
    .bind(record.pv_est_mwh)
    .bind(record.wind_est_mwh)
    .bind(record.computed_at.timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Rows with `start <= ts < end`, oldest first
pub async fn list_feature_window(
    pool: &SqlitePool,
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<FeatureRecord>, SqliteError> {
    let rows: Vec<FeatureRow> = sqlx::query_as(
        r#"
        SELECT site, ts, ghi_kwh_m2, pv_est_mwh, wind_est_mwh, computed_at
        FROM mart_features
        WHERE site = ? AND ts >= ? AND ts < ?
        ORDER BY ts ASC
        "#,
    )
    .bind(site)
    .bind(start.timestamp())
    .bind(end.timestamp())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(site, ts, ghi_kwh_m2, pv_est_mwh, wind_est_mwh, computed_at)| FeatureRecord {
                site,
                ts: secs_to_datetime(ts),
                ghi_kwh_m2,
                pv_est_mwh,
                wind_est_mwh,
                computed_at: secs_to_datetime(computed_at),
            },
        )
        .collect())
}
