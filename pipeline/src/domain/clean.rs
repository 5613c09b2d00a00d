//! Silver cleaning
//!
//! Bronze rows in a window are validated one by one. Survivors are upserted
//! into `fact_weather`; every other row is attributed exactly one
//! [`DropReason`], the first failing check in this order:
//!
//! 1. `null_ghi`
//! 2. `null_temp`
//! 3. `null_wind`
//! 4. `out_of_range`
//! 5. `misaligned_timestamp`
//!
//! A row the store rejects despite passing validation counts as
//! `constraint_violation`. So `kept_count + dropped() == raw_count` always.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::PipelineError;
use super::window::HourWindow;
use crate::core::constants::{GHI_MIN_WM2, TEMP_MAX_C, TEMP_MIN_C, WIND_MIN_MPS};
use crate::data::sqlite::repositories::{delete_fact, list_raw_window, upsert_fact};
use crate::data::{FactWeatherRecord, RawWeatherRecord, SqliteService};
use crate::utils::time::is_hour_aligned;

/// Why a Bronze row did not reach Silver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NullGhi,
    NullTemp,
    NullWind,
    OutOfRange,
    MisalignedTimestamp,
    ConstraintViolation,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NullGhi => "null_ghi",
            Self::NullTemp => "null_temp",
            Self::NullWind => "null_wind",
            Self::OutOfRange => "out_of_range",
            Self::MisalignedTimestamp => "misaligned_timestamp",
            Self::ConstraintViolation => "constraint_violation",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn in_range(value: f64, min: f64, max: f64) -> bool {
    value.is_finite() && value >= min && value <= max
}

/// Hard validation of one Bronze row
pub fn validate(
    raw: &RawWeatherRecord,
    cleaned_at: DateTime<Utc>,
) -> Result<FactWeatherRecord, DropReason> {
    let ghi_wm2 = raw.ghi_wm2.ok_or(DropReason::NullGhi)?;
    let temp_c = raw.temp_c.ok_or(DropReason::NullTemp)?;
    let wind_mps = raw.wind_mps.ok_or(DropReason::NullWind)?;

    if !in_range(ghi_wm2, GHI_MIN_WM2, f64::MAX)
        || !in_range(temp_c, TEMP_MIN_C, TEMP_MAX_C)
        || !in_range(wind_mps, WIND_MIN_MPS, f64::MAX)
    {
        return Err(DropReason::OutOfRange);
    }
    if !is_hour_aligned(raw.ts) {
        return Err(DropReason::MisalignedTimestamp);
    }

    Ok(FactWeatherRecord {
        site: raw.site.clone(),
        ts: raw.ts,
        ghi_wm2,
        temp_c,
        wind_mps,
        cleaned_at,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanReport {
    pub site: String,
    pub window: HourWindow,
    pub raw_count: u64,
    pub kept_count: u64,
    /// Non-zero counters only
    pub drop_reasons: BTreeMap<DropReason, u64>,
    /// Silver rows deleted because their Bronze row no longer validates
    pub retracted_count: u64,
}

impl CleanReport {
    pub fn dropped(&self) -> u64 {
        self.drop_reasons.values().sum()
    }

    pub fn constraint_violations(&self) -> u64 {
        self.drop_reasons
            .get(&DropReason::ConstraintViolation)
            .copied()
            .unwrap_or(0)
    }

    /// `kept_count + dropped == raw_count`
    pub fn is_complete(&self) -> bool {
        self.kept_count + self.dropped() == self.raw_count
    }

    fn count(&mut self, reason: DropReason) {
        *self.drop_reasons.entry(reason).or_insert(0) += 1;
    }
}

pub struct Cleaner {
    db: Arc<SqliteService>,
}

impl Cleaner {
    pub fn new(db: Arc<SqliteService>) -> Self {
        Self { db }
    }

    pub async fn clean(
        &self,
        site: &str,
        window: HourWindow,
    ) -> Result<CleanReport, PipelineError> {
        let pool = self.db.pool();
        let rows = list_raw_window(pool, site, window.start(), window.end_exclusive()).await?;

        let mut report = CleanReport {
            site: site.to_string(),
            window,
            raw_count: rows.len() as u64,
            kept_count: 0,
            drop_reasons: BTreeMap::new(),
            retracted_count: 0,
        };

        let cleaned_at = Utc::now();
        for raw in &rows {
            let fact = match validate(raw, cleaned_at) {
                Ok(fact) => fact,
                Err(reason) => {
                    tracing::debug!(
                        site = %site,
                        ts = %raw.ts,
                        reason = %reason,
                        "Dropped raw row"
                    );
                    report.count(reason);
                    if delete_fact(pool, site, raw.ts).await? {
                        report.retracted_count += 1;
                    }
                    continue;
                }
            };

            match upsert_fact(pool, &fact).await {
                Ok(()) => report.kept_count += 1,
                Err(e) if e.is_constraint_violation() => {
                    tracing::error!(
                        site = %site,
                        ts = %fact.ts,
                        error = %e,
                        "Store rejected validated fact row"
                    );
                    report.count(DropReason::ConstraintViolation);
                    if delete_fact(pool, site, fact.ts).await? {
                        report.retracted_count += 1;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            site = %site,
            raw = report.raw_count,
            kept = report.kept_count,
            dropped = report.dropped(),
            retracted = report.retracted_count,
            "Clean complete"
        );

        Ok(report)
    }
}
