//! Silver repository: `fact_weather`

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::FactWeatherRecord;
use crate::utils::time::secs_to_datetime;

type FactRow = (String, i64, f64, f64, f64, i64);

fn from_row(row: FactRow) -> FactWeatherRecord {
    let (site, ts, ghi_wm2, temp_c, wind_mps, cleaned_at) = row;
    FactWeatherRecord {
        site,
        ts: secs_to_datetime(ts),
        ghi_wm2,
        temp_c,
        wind_mps,
        cleaned_at: secs_to_datetime(cleaned_at),
    }
}

pub async fn upsert_fact(pool: &SqlitePool, record: &FactWeatherRecord) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO fact_weather (site, ts, ghi_wm2, temp_c, wind_mps, cleaned_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (site, ts) DO UPDATE SET
            ghi_wm2 = excluded.ghi_wm2,
            temp_c = excluded.temp_c,
            wind_mps = excluded.wind_mps,
            cleaned_at = excluded.cleaned_at
        "#,
    )
    .bind(&record.site)
    .bind(record.ts.timestamp())
    .bind(record.ghi_wm2)
    .bind(record.temp_c)
    .bind(record.wind_mps)
    .bind(record.cleaned_at.timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove the Silver row for (site, ts); Gold rows follow by cascade
///
/// Returns true if a row was removed.
pub async fn delete_fact(
    pool: &SqlitePool,
    site: &str,
    ts: DateTime<Utc>,
) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM fact_weather WHERE site = ? AND ts = ?")
        .bind(site)
        .bind(ts.timestamp())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Rows with `start <= ts < end`, oldest first
pub async fn list_fact_window(
    pool: &SqlitePool,
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<FactWeatherRecord>, SqliteError> {
    let rows: Vec<FactRow> = sqlx::query_as(
        r#"
        SELECT site, ts, ghi_wm2, temp_c, wind_mps, cleaned_at
        FROM fact_weather
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
pub async fn list_recent_fact(
    pool: &SqlitePool,
    site: &str,
    limit: u32,
) -> Result<Vec<FactWeatherRecord>, SqliteError> {
    let rows: Vec<FactRow> = sqlx::query_as(
        r#"
        SELECT site, ts, ghi_wm2, temp_c, wind_mps, cleaned_at
        FROM fact_weather
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
