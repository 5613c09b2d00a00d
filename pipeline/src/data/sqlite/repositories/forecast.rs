//! Forecast repository: `mart_forecast`

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::data::sqlite::SqliteError;
use crate::data::types::ForecastRecord;
use crate::utils::time::secs_to_datetime;

type ForecastRow = (String, i64, String, String, i64, f64, f64, f64, i64);

fn from_row(row: ForecastRow) -> Result<ForecastRecord, SqliteError> {
    let (site, ts, model, var, horizon, yhat, yhat_lower, yhat_upper, created_at) = row;
    Ok(ForecastRecord {
        site,
        ts: secs_to_datetime(ts),
        model: model.parse().map_err(SqliteError::Decode)?,
        var: var.parse().map_err(SqliteError::Decode)?,
        horizon,
        yhat,
        yhat_lower,
        yhat_upper,
        created_at: secs_to_datetime(created_at),
    })
}

/// Insert or overwrite the forecast for its five-part key
///
/// Accepts a pool or a transaction.
pub async fn upsert_forecast<'e, E>(executor: E, record: &ForecastRecord) -> Result<(), SqliteError>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO mart_forecast (
            site, ts, model, var, horizon, yhat, yhat_lower, yhat_upper, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (site, ts, model, var, horizon) DO UPDATE SET
            yhat = excluded.yhat,
            yhat_lower = excluded.yhat_lower,
            yhat_upper = excluded.yhat_upper,
            created_at = excluded.created_at
        "#,
    )
    .bind(&record.site)
    .bind(record.ts.timestamp())
    .bind(record.model.as_str())
    .bind(record.var.as_str())
    .bind(record.horizon)
    .bind(record.yhat)
    .bind(record.yhat_lower)
    .bind(record.yhat_upper)
    .bind(record.created_at.timestamp())
    .execute(executor)
    .await?;

    Ok(())
}

/// All forecasts targeting one hour, ordered by model, var, horizon
pub async fn list_forecasts_at(
    pool: &SqlitePool,
    site: &str,
    ts: DateTime<Utc>,
) -> Result<Vec<ForecastRecord>, SqliteError> {
    let rows: Vec<ForecastRow> = sqlx::query_as(
        r#"
        SELECT site, ts, model, var, horizon, yhat, yhat_lower, yhat_upper, created_at
        FROM mart_forecast
        WHERE site = ? AND ts = ?
        ORDER BY model, var, horizon
        "#,
    )
    .bind(site)
    .bind(ts.timestamp())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(from_row).collect()
}

/// Forecasts with `start <= ts < end`, ordered by ts, model, var, horizon
pub async fn list_forecast_window(
    pool: &SqlitePool,
    site: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<ForecastRecord>, SqliteError> {
    let rows: Vec<ForecastRow> = sqlx::query_as(
        r#"
        SELECT site, ts, model, var, horizon, yhat, yhat_lower, yhat_upper, created_at
        FROM mart_forecast
        WHERE site = ? AND ts >= ? AND ts < ?
        ORDER BY ts, model, var, horizon
        "#,
    )
    .bind(site)
    .bind(start.timestamp())
    .bind(end.timestamp())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(from_row).collect()
}
