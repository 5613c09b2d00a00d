//! Layered weather → renewable KPI pipeline on SQLite
//!
//! - `core` - CLI, configuration, storage paths
//! - `data` - the store: schema, migrations, repositories, row types
//! - `domain` - pipeline stages, forecast contract, read accessors
//! - `utils` - small shared helpers

pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
