//! Pipeline stages and read accessors
//!
//! - `ingest` - Bronze: fetch, normalize, upsert raw observations
//! - `clean` - Silver: validation and drop-reason accounting
//! - `features` - Gold: irradiance energy and generation estimates
//! - `kpi` - Gold: capacity factors
//! - `forecast` - storage contract for externally produced forecasts
//! - `query` - read-only accessors for the serving layer
//! - `pipeline` - all four stages in order

pub mod clean;
pub mod error;
pub mod features;
pub mod forecast;
pub mod ingest;
pub mod kpi;
pub mod pipeline;
pub mod query;
pub mod window;

pub use clean::{CleanReport, Cleaner, DropReason};
pub use error::PipelineError;
pub use features::{
    FeatureComputer, FeatureReport, FeatureValues, derive_feature, wind_power_fraction,
};
pub use forecast::{ForecastInput, ForecastStore};
pub use ingest::{
    FetchPolicy, IngestReport, Ingestor, NasaPowerSource, SourceError, SourceObservation,
    StaticSource, WeatherSource,
};
pub use kpi::{KpiComputer, KpiReport, KpiValues, derive_kpi};
pub use pipeline::{PipelineRunner, RunReport};
pub use query::{QueryService, SiteHealth, Summary};
pub use window::HourWindow;
