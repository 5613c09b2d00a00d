// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Climate";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "climate";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".climate";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "climate.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CLIMATE_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "CLIMATE_LOG";

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "CLIMATE_DATA_DIR";

// =============================================================================
// Environment Variables - Weather Source
// =============================================================================

/// Environment variable for the weather source base URL
pub const ENV_SOURCE_URL: &str = "CLIMATE_SOURCE_URL";

/// Environment variable for the per-attempt fetch timeout
pub const ENV_SOURCE_TIMEOUT_SECS: &str = "CLIMATE_SOURCE_TIMEOUT_SECS";

/// Environment variable for the fetch attempt budget
pub const ENV_SOURCE_MAX_ATTEMPTS: &str = "CLIMATE_SOURCE_MAX_ATTEMPTS";

/// Environment variable for the fetch unit size in days
pub const ENV_SOURCE_CHUNK_DAYS: &str = "CLIMATE_SOURCE_CHUNK_DAYS";

// =============================================================================
// Weather Source Defaults
// =============================================================================

/// NASA POWER hourly point endpoint
pub const DEFAULT_SOURCE_URL: &str = "https://power.larc.nasa.gov/api/temporal/hourly/point";

/// Per-attempt fetch timeout
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 60;

/// Fetch attempts per unit before its hours are skipped
pub const DEFAULT_SOURCE_MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between attempts
pub const DEFAULT_SOURCE_BASE_DELAY_MS: u64 = 500;

/// Days covered by one fetch unit
pub const DEFAULT_SOURCE_CHUNK_DAYS: u32 = 7;

/// Tag recorded in the audit payload of NASA POWER rows
pub const NASA_POWER_SOURCE: &str = "NASA_POWER";

/// NASA POWER parameter for global horizontal irradiance (W/m²)
pub const NASA_PARAM_GHI: &str = "ALLSKY_SFC_SW_DWN";

/// NASA POWER parameter for 2 m air temperature (°C)
pub const NASA_PARAM_TEMP: &str = "T2M";

/// NASA POWER parameter for 10 m wind speed (m/s)
pub const NASA_PARAM_WIND: &str = "WS10M";

// =============================================================================
// SQLite Settings
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "climate.db";

/// Default busy timeout; concurrent writers wait this long for the lock
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// Default connection pool size
pub const SQLITE_MAX_CONNECTIONS: u32 = 4;

/// Page cache size (negative = KiB)
pub const SQLITE_CACHE_SIZE: &str = "-16000";

/// Pages between automatic WAL checkpoints
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

// =============================================================================
// Physical Bounds (Bronze tolerance, Silver strictness)
// =============================================================================

/// Lower bound for global horizontal irradiance (W/m²)
pub const GHI_MIN_WM2: f64 = 0.0;

/// Lower bound for air temperature (°C)
pub const TEMP_MIN_C: f64 = -80.0;

/// Upper bound for air temperature (°C)
pub const TEMP_MAX_C: f64 = 80.0;

/// Lower bound for wind speed (m/s)
pub const WIND_MIN_MPS: f64 = 0.0;

// =============================================================================
// Derivations
// =============================================================================

/// Interval length of one observation in hours
pub const INTERVAL_HOURS: f64 = 1.0;

/// Wh/m² per kWh/m²
pub const WH_PER_KWH: f64 = 1000.0;

/// Capacity factors are clamped into [0, CAPACITY_FACTOR_MAX]
pub const CAPACITY_FACTOR_MAX: f64 = 1.2;

// =============================================================================
// Forecasts
// =============================================================================

/// Shortest accepted forecast horizon (hours ahead)
pub const FORECAST_HORIZON_MIN: i64 = 1;

/// Longest accepted forecast horizon (hours ahead)
pub const FORECAST_HORIZON_MAX: i64 = 48;

// =============================================================================
// Queries
// =============================================================================

/// Largest recent window served by the query accessors
pub const QUERY_MAX_HOURS: u32 = 336;

/// Default recent window for CLI queries
pub const QUERY_DEFAULT_HOURS: u32 = 24;
