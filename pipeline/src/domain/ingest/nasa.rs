//! NASA POWER hourly point API
//!
//! Response shape: `properties.parameter.<PARAM>` maps either
//! `YYYYMMDDHH → value` or `YYYYMMDD → [24 hourly values]`. Missing data is
//! reported as the fill value `-999`, which the ingestor's bounds turn into
//! null while the audit payload keeps it.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde_json::{Value, json};

use super::source::{SourceError, SourceObservation, WeatherSource};
use crate::core::config::{SiteConfig, SourceConfig};
use crate::core::constants::{NASA_PARAM_GHI, NASA_PARAM_TEMP, NASA_PARAM_WIND, NASA_POWER_SOURCE};
use crate::domain::window::HourWindow;
use crate::utils::time::{format_yyyymmdd, parse_yyyymmdd};

const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct NasaPowerSource {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl NasaPowerSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("climate-pipeline/{}", CURRENT_VERSION))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('?').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    /// Request URL for whole UTC days covering `window`
    pub fn build_url(&self, site: &SiteConfig, window: &HourWindow) -> String {
        let start = format_yyyymmdd(window.start().date_naive());
        let end = format_yyyymmdd(window.end().date_naive());
        format!(
            "{}?parameters={},{},{}&community=RE&longitude={}&latitude={}\
             &start={}&end={}&format=JSON&time-standard=UTC",
            self.base_url,
            NASA_PARAM_GHI,
            NASA_PARAM_TEMP,
            NASA_PARAM_WIND,
            site.lon,
            site.lat,
            start,
            end
        )
    }
}

#[async_trait]
impl WeatherSource for NasaPowerSource {
    fn name(&self) -> &str {
        NASA_POWER_SOURCE
    }

    async fn fetch(
        &self,
        site: &SiteConfig,
        window: &HourWindow,
    ) -> Result<Vec<SourceObservation>, SourceError> {
        let url = self.build_url(site, window);
        tracing::debug!(url = %url, "Fetching NASA POWER window");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.timeout_secs)
            } else {
                SourceError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let payload: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.timeout_secs)
            } else {
                SourceError::Parse(e.to_string())
            }
        })?;

        parse_power_json(&payload)
    }
}

/// Per-parameter series keyed by hour
fn series_from_param(param: &Value) -> BTreeMap<DateTime<Utc>, Option<f64>> {
    let mut series = BTreeMap::new();
    let Some(entries) = param.as_object() else {
        return series;
    };

    for (key, value) in entries {
        match value {
            Value::Array(hourly) => {
                let Ok(date) = parse_yyyymmdd(key) else {
                    tracing::debug!(key = %key, "Skipping unparseable daily key");
                    continue;
                };
                let midnight = date.and_time(NaiveTime::MIN).and_utc();
                for (hour, v) in hourly.iter().take(24).enumerate() {
                    series.insert(midnight + chrono::Duration::hours(hour as i64), v.as_f64());
                }
            }
            _ => match parse_hour_key(key) {
                Some(ts) => {
                    series.insert(ts, value.as_f64());
                }
                None => tracing::debug!(key = %key, "Skipping unparseable hourly key"),
            },
        }
    }
    series
}

/// `YYYYMMDDHH` (extra trailing characters ignored)
fn parse_hour_key(key: &str) -> Option<DateTime<Utc>> {
    let date = parse_yyyymmdd(key.get(..8)?).ok()?;
    let hour: u32 = key.get(8..10)?.parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    Some(date.and_time(time).and_utc())
}

/// Merge the three parameters into one observation per timestamp
pub fn parse_power_json(payload: &Value) -> Result<Vec<SourceObservation>, SourceError> {
    let params = payload
        .get("properties")
        .and_then(|p| p.get("parameter"))
        .ok_or_else(|| SourceError::Parse("missing properties.parameter".to_string()))?;

    let ghi = series_from_param(&params[NASA_PARAM_GHI]);
    let temp = series_from_param(&params[NASA_PARAM_TEMP]);
    let wind = series_from_param(&params[NASA_PARAM_WIND]);

    let mut timestamps: Vec<DateTime<Utc>> = ghi
        .keys()
        .chain(temp.keys())
        .chain(wind.keys())
        .copied()
        .collect();
    timestamps.sort();
    timestamps.dedup();

    Ok(timestamps
        .into_iter()
        .map(|ts| {
            let ghi_wm2 = ghi.get(&ts).copied().flatten();
            let temp_c = temp.get(&ts).copied().flatten();
            let wind_mps = wind.get(&ts).copied().flatten();
            SourceObservation {
                ts,
                ghi_wm2,
                temp_c,
                wind_mps,
                payload: json!({
                    "source": NASA_POWER_SOURCE,
                    "ghi_wm2": ghi_wm2,
                    "t2m_c": temp_c,
                    "ws10_mps": wind_mps,
                }),
            }
        })
        .collect())
}
