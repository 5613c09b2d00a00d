//! In-memory weather source
//!
//! Serves a fixed set of observations; used to replay captured data and in
//! tests. Like the NASA POWER API it answers with whole UTC days, so a
//! response may carry hours outside the requested window. Failures can be
//! injected per call or per fetch unit.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::nasa::parse_power_json;
use super::source::{SourceError, SourceObservation, WeatherSource};
use crate::core::config::SiteConfig;
use crate::domain::window::HourWindow;

#[derive(Default)]
pub struct StaticSource {
    observations: Vec<SourceObservation>,
    /// Number of upcoming calls that fail before calls succeed again
    transient_failures: AtomicU32,
    /// Units (by start hour) that always fail
    failing_units: Mutex<HashSet<DateTime<Utc>>>,
    calls: AtomicU32,
}

impl StaticSource {
    pub fn new(observations: Vec<SourceObservation>) -> Self {
        Self {
            observations,
            ..Default::default()
        }
    }

    /// Replay a captured NASA POWER response
    pub fn from_power_json(payload: &serde_json::Value) -> Result<Self, SourceError> {
        parse_power_json(payload).map(Self::new)
    }

    /// Fail the next `n` calls with a timeout
    pub fn fail_next(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Always fail the unit starting at `start`
    pub fn fail_unit(self, start: DateTime<Utc>) -> Self {
        if let Ok(mut units) = self.failing_units.lock() {
            units.insert(start);
        }
        self
    }

    /// Total fetch calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(
        &self,
        _site: &SiteConfig,
        window: &HourWindow,
    ) -> Result<Vec<SourceObservation>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_units
            .lock()
            .map(|units| units.contains(&window.start()))
            .unwrap_or(false);
        if failing {
            return Err(SourceError::Status(503));
        }

        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            return Err(SourceError::Timeout(1));
        }

        let first_day = window.start().date_naive();
        let last_day = window.end().date_naive();
        Ok(self
            .observations
            .iter()
            .filter(|o| (first_day..=last_day).contains(&o.ts.date_naive()))
            .cloned()
            .collect())
    }
}
