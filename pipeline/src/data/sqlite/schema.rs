//! SQLite schema definitions
//!
//! Medallion layout: `raw_weather` (Bronze) → `fact_weather` (Silver) →
//! `mart_features` → `mart_kpis` (Gold), plus `mart_forecast`. Each layer
//! references the one below it with `ON DELETE CASCADE`, so a Gold row can
//! never outlive the Silver row it was derived from.
//!
//! Range and alignment rules live in CHECK constraints; application code
//! validates first, the store enforces regardless.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Bronze: raw observations (nullable values, audit payload)
-- =============================================================================
CREATE TABLE IF NOT EXISTS raw_weather (
    site TEXT NOT NULL CHECK(length(site) >= 1),
    ts INTEGER NOT NULL,
    ghi_wm2 REAL CHECK(ghi_wm2 IS NULL OR ghi_wm2 >= 0),
    temp_c REAL CHECK(temp_c IS NULL OR (temp_c >= -80 AND temp_c <= 80)),
    wind_mps REAL CHECK(wind_mps IS NULL OR wind_mps >= 0),
    raw_payload TEXT NOT NULL CHECK(json_valid(raw_payload)),
    ingested_at INTEGER NOT NULL,
    PRIMARY KEY (site, ts)
);

-- =============================================================================
-- 2. Silver: validated hourly facts
-- =============================================================================
CREATE TABLE IF NOT EXISTS fact_weather (
    site TEXT NOT NULL,
    ts INTEGER NOT NULL CHECK(ts % 3600 = 0),
    ghi_wm2 REAL NOT NULL CHECK(ghi_wm2 >= 0),
    temp_c REAL NOT NULL CHECK(temp_c >= -80 AND temp_c <= 80),
    wind_mps REAL NOT NULL CHECK(wind_mps >= 0),
    cleaned_at INTEGER NOT NULL,
    PRIMARY KEY (site, ts),
    FOREIGN KEY (site, ts) REFERENCES raw_weather(site, ts) ON DELETE CASCADE
);

-- =============================================================================
-- 3. Gold: generation features
-- =============================================================================
CREATE TABLE IF NOT EXISTS mart_features (
    site TEXT NOT NULL,
    ts INTEGER NOT NULL CHECK(ts % 3600 = 0),
    ghi_kwh_m2 REAL NOT NULL CHECK(ghi_kwh_m2 >= 0),
    pv_est_mwh REAL NOT NULL CHECK(pv_est_mwh >= 0),
    wind_est_mwh REAL NOT NULL CHECK(wind_est_mwh >= 0),
    computed_at INTEGER NOT NULL,
    PRIMARY KEY (site, ts),
    FOREIGN KEY (site, ts) REFERENCES fact_weather(site, ts) ON DELETE CASCADE
);

-- =============================================================================
-- 4. Gold: capacity-factor KPIs
-- =============================================================================
CREATE TABLE IF NOT EXISTS mart_kpis (
    site TEXT NOT NULL,
    ts INTEGER NOT NULL CHECK(ts % 3600 = 0),
    pv_capacity_mw REAL NOT NULL CHECK(pv_capacity_mw > 0),
    wind_capacity_mw REAL NOT NULL CHECK(wind_capacity_mw > 0),
    pv_cf REAL NOT NULL CHECK(pv_cf >= 0 AND pv_cf <= 1.2),
    wind_cf REAL NOT NULL CHECK(wind_cf >= 0 AND wind_cf <= 1.2),
    computed_at INTEGER NOT NULL,
    PRIMARY KEY (site, ts),
    FOREIGN KEY (site, ts) REFERENCES mart_features(site, ts) ON DELETE CASCADE
);

-- =============================================================================
-- 5. Forecasts (externally produced, stored under a fixed contract)
-- =============================================================================
CREATE TABLE IF NOT EXISTS mart_forecast (
    site TEXT NOT NULL CHECK(length(site) >= 1),
    ts INTEGER NOT NULL CHECK(ts % 3600 = 0),
    model TEXT NOT NULL CHECK(model IN ('baseline', 'sarimax')),
    var TEXT NOT NULL CHECK(var IN ('pv', 'wind')),
    horizon INTEGER NOT NULL CHECK(horizon >= 1 AND horizon <= 48),
    yhat REAL NOT NULL CHECK(yhat >= 0),
    yhat_lower REAL NOT NULL,
    yhat_upper REAL NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (site, ts, model, var, horizon),
    CHECK(yhat_lower <= yhat_upper)
);

CREATE INDEX IF NOT EXISTS idx_mart_forecast_series ON mart_forecast(site, model, var, ts);
"#;
