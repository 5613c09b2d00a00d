//! Row counts and timestamp spans per layer

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{Layer, LayerSummary};
use crate::utils::time::secs_to_datetime;

/// Row count, first and latest ts of a layer, optionally for one site
pub async fn layer_summary(
    pool: &SqlitePool,
    layer: Layer,
    site: Option<&str>,
) -> Result<LayerSummary, SqliteError> {
    // Table names come from the closed Layer enum
    let mut sql = format!("SELECT COUNT(*), MIN(ts), MAX(ts) FROM {}", layer.table());
    if site.is_some() {
        sql.push_str(" WHERE site = ?");
    }

    let mut query = sqlx::query_as::<_, (i64, Option<i64>, Option<i64>)>(&sql);
    if let Some(site) = site {
        query = query.bind(site);
    }
    let (row_count, first_ts, latest_ts) = query.fetch_one(pool).await?;

    Ok(LayerSummary {
        layer,
        table: layer.table(),
        row_count,
        first_ts: first_ts.map(secs_to_datetime),
        latest_ts: latest_ts.map(secs_to_datetime),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::memory_pool;

    #[tokio::test]
    async fn test_empty_layer() {
        let pool = memory_pool().await;
        for layer in Layer::ALL {
            let summary = layer_summary(&pool, layer, None).await.unwrap();
            assert_eq!(summary.row_count, 0);
            assert_eq!(summary.first_ts, None);
            assert_eq!(summary.latest_ts, None);
        }
    }

    #[tokio::test]
    async fn test_counts_and_span_per_site() {
        let pool = memory_pool().await;
        for (site, ts) in [("S1", 0), ("S1", 7200), ("S2", 3600)] {
            sqlx::query(
                "INSERT INTO raw_weather (site, ts, raw_payload, ingested_at) \
                 VALUES (?, ?, '{}', 0)",
            )
            .bind(site)
            .bind(ts)
            .execute(&pool)
            .await
            .unwrap();
        }

        let all = layer_summary(&pool, Layer::Raw, None).await.unwrap();
        assert_eq!(all.row_count, 3);
        assert_eq!(all.table, "raw_weather");

        let s1 = layer_summary(&pool, Layer::Raw, Some("S1")).await.unwrap();
        assert_eq!(s1.row_count, 2);
        assert_eq!(s1.first_ts, Some(secs_to_datetime(0)));
        assert_eq!(s1.latest_ts, Some(secs_to_datetime(7200)));
    }
}
