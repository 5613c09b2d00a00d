//! Data storage layer
//!
//! - `sqlite` - the relational store: pool, schema, migrations, repositories
//! - `types` - row types and closed enums shared with the services
//! - `error` - error type surfaced to the services

pub mod error;
pub mod sqlite;
pub mod types;

pub use error::DataError;
pub use sqlite::{SqliteError, SqliteService};

pub use types::{
    FactWeatherRecord, FeatureRecord, ForecastModel, ForecastRecord, ForecastVariable, KpiRecord,
    Layer, LayerSummary, RawWeatherRecord,
};
