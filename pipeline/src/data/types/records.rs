//! Row types for the pipeline tables
//!
//! Timestamps are `DateTime<Utc>` here and INTEGER Unix seconds in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ForecastModel, ForecastVariable, Layer};

// ============================================================================
// Bronze
// ============================================================================

/// Raw observation as ingested; values outside physical bounds are `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWeatherRecord {
    pub site: String,
    pub ts: DateTime<Utc>,
    pub ghi_wm2: Option<f64>,
    pub temp_c: Option<f64>,
    pub wind_mps: Option<f64>,
    /// Unmodified source values, kept for audit
    pub raw_payload: serde_json::Value,
    pub ingested_at: DateTime<Utc>,
}

// ============================================================================
// Silver
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactWeatherRecord {
    pub site: String,
    pub ts: DateTime<Utc>,
    pub ghi_wm2: f64,
    pub temp_c: f64,
    pub wind_mps: f64,
    pub cleaned_at: DateTime<Utc>,
}

// ============================================================================
// Gold
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub site: String,
    pub ts: DateTime<Utc>,
    pub ghi_kwh_m2: f64,
    pub pv_est_mwh: f64,
    pub wind_est_mwh: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub site: String,
    pub ts: DateTime<Utc>,
    pub pv_capacity_mw: f64,
    pub wind_capacity_mw: f64,
    pub pv_cf: f64,
    pub wind_cf: f64,
    pub computed_at: DateTime<Utc>,
}

// ============================================================================
// Forecasts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub site: String,
    pub ts: DateTime<Utc>,
    pub model: ForecastModel,
    pub var: ForecastVariable,
    pub horizon: i64,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Stats
// ============================================================================

/// Row count and timestamp span of one layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    pub layer: Layer,
    pub table: &'static str,
    pub row_count: i64,
    pub first_ts: Option<DateTime<Utc>>,
    pub latest_ts: Option<DateTime<Utc>>,
}
