//! Bronze repository: `raw_weather`

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::RawWeatherRecord;
use crate::utils::time::secs_to_datetime;

type RawRow = (
    String,
    i64,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    String,
    i64,
);

fn from_row(row: RawRow) -> RawWeatherRecord {
    let (site, ts, ghi_wm2, temp_c, wind_mps, payload, ingested_at) = row;
    let raw_payload =
        serde_json::from_str(&payload).unwrap_or(serde_json::Value::String(payload));
    RawWeatherRecord {
        site,
        ts: secs_to_datetime(ts),
        ghi_wm2,
        temp_c,
        wind_mps,
        raw_payload,
        ingested_at: secs_to_datetime(ingested_at),
    }
}

/// Insert or overwrite the observation for (site, ts)
///
/// Last write wins: values, payload and `ingested_at` are all replaced.
pub async fn upsert_raw(pool: &SqlitePool, record: &RawWeatherRecord) -> Result<(), SqliteError> {
    let payload = serde_json::to_string(&record.raw_payload)
        .map_err(|e| SqliteError::Decode(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO raw_weather (site, ts, ghi_wm2, temp_c, wind_mps, raw_payload, ingested_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (site, ts) DO UPDATE SET
            ghi_wm2 = excluded.ghi_wm2,
            temp_c = excluded.temp_c,
            wind_mps = excluded.wind_mps,
            raw_payload = excluded.raw_payload,
            ingested_at = excluded.ingested_at
        "#,
    )
    .bind(&record.site)
    .bind(record.ts.timestamp())
    .bind(record.ghi_wm2)
    .bind(record.temp_c)
    .bind(record.wind_mps)
    .bind(payload)
    .bind(record.ingested_at.timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Rows with `start <= ts < end`, oldest first
pub async fn list_raw_window(
    pool: &SqlitePool,
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<RawWeatherRecord>, SqliteError> {
    let rows: Vec<RawRow> = sqlx::query_as(
        r#"
        SELECT site, ts, ghi_wm2, temp_c, wind_mps, raw_payload, ingested_at
        FROM raw_weather
        WHERE site = ? AND ts >= ? AND ts < ?
        ORDER BY ts ASC
        "#,
    )
    .bind(site)
    .bind(start.timestamp())
    .bind(end.timestamp())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(from_row).collect())
}

/// Most recent `limit` rows for a site, newest first
pub async fn list_recent_raw(
    pool: &SqlitePool,
    site: &str,
    limit: u32,
) -> Result<Vec<RawWeatherRecord>, SqliteError> {
    let rows: Vec<RawRow> = sqlx::query_as(
        r#"
        SELECT site, ts, ghi_wm2, temp_c, wind_mps, raw_payload, ingested_at
        FROM raw_weather
        WHERE site = ?
        ORDER BY ts DESC
        LIMIT ?
        "#,
    )
    .bind(site)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(from_row).collect())
}

/// Distinct sites present in the Bronze layer, sorted
pub async fn list_sites(pool: &SqlitePool) -> Result<Vec<String>, SqliteError> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT site FROM raw_weather ORDER BY site ASC")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(site,)| site).collect())
}
