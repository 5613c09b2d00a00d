//! Gold repository: `mart_kpis`

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::KpiRecord;
use crate::utils::time::secs_to_datetime;

type KpiRow = (String, i64, f64, f64, f64, f64, i64);

pub async fn upsert_kpi(pool: &SqlitePool, record: &KpiRecord) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO mart_kpis (
            site, ts, pv_capacity_mw, wind_capacity_mw, pv_cf, wind_cf, computed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (site, ts) DO UPDATE SET
            pv_capacity_mw = excluded.pv_capacity_mw,
            wind_capacity_mw = excluded.wind_capacity_mw,
            pv_cf = excluded.pv_cf,
            wind_cf = excluded.wind_cf,
            computed_at = excluded.computed_at
        "#,
    )
    .bind(&record.site)
    .bind(record.ts.timestamp())
    .bind(record.pv_capacity_mw)
    .bind(record.wind_capacity_mw)
    .bind(record.pv_cf)
    .bind(record.wind_cf)
    .bind(record.computed_at.timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Rows with `start <= ts < end`, oldest first
pub async fn list_kpi_window(
    pool: &SqlitePool,
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<KpiRecord>, SqliteError> {
    let rows: Vec<KpiRow> = sqlx::query_as(
        r#"
        SELECT site, ts, pv_capacity_mw, wind_capacity_mw, pv_cf, wind_cf, computed_at
        FROM mart_kpis
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
            |(site, ts, pv_capacity_mw, wind_capacity_mw, pv_cf, wind_cf, computed_at)| KpiRecord {
                site,
                ts: secs_to_datetime(ts),
                pv_capacity_mw,
                wind_capacity_mw,
                pv_cf,
                wind_cf,
                computed_at: secs_to_datetime(computed_at),
            },
        )
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::memory_pool;
    use chrono::TimeZone;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    async fn seed_feature(pool: &SqlitePool, ts: DateTime<Utc>) {
        let secs = ts.timestamp();
        sqlx::query(
            "INSERT INTO raw_weather \
             (site, ts, ghi_wm2, temp_c, wind_mps, raw_payload, ingested_at) \
             VALUES ('S1', ?, 1, 1, 1, '{}', 0)",
        )
        .bind(secs)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO fact_weather (site, ts, ghi_wm2, temp_c, wind_mps, cleaned_at) \
             VALUES ('S1', ?, 1, 1, 1, 0)",
        )
        .bind(secs)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO mart_features \
             (site, ts, ghi_kwh_m2, pv_est_mwh, wind_est_mwh, computed_at) \
             VALUES ('S1', ?, 0.1, 0.8, 0.5, 0)",
        )
        .bind(secs)
        .execute(pool)
        .await
        .unwrap();
    }

    fn kpi(ts: DateTime<Utc>, pv_cf: f64) -> KpiRecord {
        KpiRecord {
            site: "S1".to_string(),
            ts,
            pv_capacity_mw: 10.0,
            wind_capacity_mw: 5.0,
            pv_cf,
            wind_cf: 0.1,
            computed_at: ts,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_list() {
        let pool = memory_pool().await;
        seed_feature(&pool, hour(3)).await;
        upsert_kpi(&pool, &kpi(hour(3), 0.08)).await.unwrap();

        let rows = list_kpi_window(&pool, "S1", hour(0), hour(4)).await.unwrap();
        assert_eq!(rows, vec![kpi(hour(3), 0.08)]);
    }

    #[tokio::test]
    async fn test_capacity_factor_bound_enforced_by_store() {
        let pool = memory_pool().await;
        seed_feature(&pool, hour(0)).await;
        let err = upsert_kpi(&pool, &kpi(hour(0), 1.3)).await.unwrap_err();
        assert!(err.is_constraint_violation());
        upsert_kpi(&pool, &kpi(hour(0), 1.2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_requires_feature_parent() {
        let pool = memory_pool().await;
        let err = upsert_kpi(&pool, &kpi(hour(0), 0.5)).await.unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
