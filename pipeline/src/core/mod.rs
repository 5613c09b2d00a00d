//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod storage;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands};
pub use config::{AppConfig, PowerCurveRamp, SiteCatalog, SiteConfig, WindCurveConfig};
pub use storage::{AppStorage, DataSubdir};

pub use crate::data::SqliteService;
