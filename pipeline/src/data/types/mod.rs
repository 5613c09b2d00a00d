//! Shared data types
//!
//! Row types for every pipeline layer and the closed enums stored with them.

mod enums;
mod records;

pub use enums::{ForecastModel, ForecastVariable, Layer};

pub use records::{
    FactWeatherRecord, FeatureRecord, ForecastRecord, KpiRecord, LayerSummary, RawWeatherRecord,
};
