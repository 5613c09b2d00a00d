//! Forecast storage contract
//!
//! Forecasts are produced elsewhere; this module validates them at the
//! boundary and stores them under the key (site, ts, model, var, horizon).
//! Invalid input is rejected before the store is touched, never clamped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::window::HourWindow;
use crate::core::constants::{FORECAST_HORIZON_MAX, FORECAST_HORIZON_MIN};
use crate::data::sqlite::repositories::{list_forecast_window, list_forecasts_at, upsert_forecast};
use crate::data::{ForecastModel, ForecastRecord, ForecastVariable, SqliteError, SqliteService};
use crate::utils::time::is_hour_aligned;

/// Forecast as handed over by a producer; model and var are still free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInput {
    pub site: String,
    pub ts: DateTime<Utc>,
    pub model: String,
    pub var: String,
    pub horizon: i64,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

fn finite(field: &'static str, value: f64) -> Result<f64, PipelineError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PipelineError::invalid_forecast(field, format!("{} is not a finite number", value)))
    }
}

impl ForecastInput {
    pub fn validate(&self, created_at: DateTime<Utc>) -> Result<ForecastRecord, PipelineError> {
        if self.site.trim().is_empty() {
            return Err(PipelineError::invalid_forecast("site", "must not be empty"));
        }
        if !is_hour_aligned(self.ts) {
            return Err(PipelineError::invalid_forecast(
                "ts",
                format!("{} is not aligned to the hour", self.ts),
            ));
        }
        let model: ForecastModel = self
            .model
            .parse()
            .map_err(|e: String| PipelineError::invalid_forecast("model", e))?;
        let var: ForecastVariable = self
            .var
            .parse()
            .map_err(|e: String| PipelineError::invalid_forecast("var", e))?;
        if !(FORECAST_HORIZON_MIN..=FORECAST_HORIZON_MAX).contains(&self.horizon) {
            return Err(PipelineError::invalid_forecast(
                "horizon",
                format!(
                    "{} is outside [{}, {}]",
                    self.horizon, FORECAST_HORIZON_MIN, FORECAST_HORIZON_MAX
                ),
            ));
        }

        let yhat = finite("yhat", self.yhat)?;
        let yhat_lower = finite("yhat_lower", self.yhat_lower)?;
        let yhat_upper = finite("yhat_upper", self.yhat_upper)?;
        if yhat < 0.0 {
            return Err(PipelineError::invalid_forecast("yhat", format!("{} is negative", yhat)));
        }
        if yhat_lower > yhat_upper {
            return Err(PipelineError::invalid_forecast(
                "yhat_lower",
                format!("{} is above yhat_upper {}", yhat_lower, yhat_upper),
            ));
        }

        Ok(ForecastRecord {
            site: self.site.clone(),
            ts: self.ts,
            model,
            var,
            horizon: self.horizon,
            yhat,
            yhat_lower,
            yhat_upper,
            created_at,
        })
    }
}

pub struct ForecastStore {
    db: Arc<SqliteService>,
}

impl ForecastStore {
    pub fn new(db: Arc<SqliteService>) -> Self {
        Self { db }
    }

    pub async fn store_forecast(
        &self,
        input: &ForecastInput,
    ) -> Result<ForecastRecord, PipelineError> {
        let record = input.validate(Utc::now())?;
        upsert_forecast(self.db.pool(), &record).await?;
        tracing::debug!(
            site = %record.site,
            ts = %record.ts,
            model = %record.model,
            var = %record.var,
            horizon = record.horizon,
            "Stored forecast"
        );
        Ok(record)
    }

    /// All-or-nothing: one invalid entry rejects the whole batch
    pub async fn store_forecasts(&self, inputs: &[ForecastInput]) -> Result<u64, PipelineError> {
        let created_at = Utc::now();
        let records = inputs
            .iter()
            .map(|input| input.validate(created_at))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.db.pool().begin().await.map_err(SqliteError::from)?;
        for record in &records {
            upsert_forecast(&mut *tx, record).await?;
        }
        tx.commit().await.map_err(SqliteError::from)?;

        tracing::info!(count = records.len(), "Stored forecast batch");
        Ok(records.len() as u64)
    }

    pub async fn forecasts_at(
        &self,
        site: &str,
        ts: DateTime<Utc>,
    ) -> Result<Vec<ForecastRecord>, PipelineError> {
        Ok(list_forecasts_at(self.db.pool(), site, ts).await?)
    }

    pub async fn forecasts_in(
        &self,
        site: &str,
        window: HourWindow,
    ) -> Result<Vec<ForecastRecord>, PipelineError> {
        let pool = self.db.pool();
        Ok(list_forecast_window(pool, site, window.start(), window.end_exclusive()).await?)
    }
}
