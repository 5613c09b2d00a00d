//! SQLite repositories
//!
//! Row types (RawWeatherRecord, FactWeatherRecord, etc.) live in `crate::data::types`.

pub mod fact;
pub mod feature;
pub mod forecast;
pub mod kpi;
pub mod raw;
pub mod stats;

pub use fact::{delete_fact, list_fact_window, list_recent_fact, upsert_fact};
pub use feature::{list_feature_window, upsert_feature};
pub use forecast::{list_forecast_window, list_forecasts_at, upsert_forecast};
pub use kpi::{list_kpi_window, upsert_kpi};
pub use raw::{list_raw_window, list_recent_raw, list_sites, upsert_raw};
pub use stats::layer_summary;
