//! Hour-granularity time windows

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use super::error::PipelineError;
use crate::utils::time::{SECS_PER_HOUR, is_hour_aligned, parse_yyyymmdd};

/// Inclusive range of whole hours, `start` through `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl HourWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, PipelineError> {
        if !is_hour_aligned(start) || !is_hour_aligned(end) {
            return Err(PipelineError::InvalidWindow(format!(
                "window bounds must be whole hours ({} .. {})",
                start, end
            )));
        }
        if end < start {
            return Err(PipelineError::InvalidWindow(format!(
                "end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// 00:00 of `start` through 23:00 of `end`
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if end < start {
            return Err(PipelineError::InvalidWindow(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        let first = start.and_time(NaiveTime::MIN).and_utc();
        let last = end.and_time(NaiveTime::MIN).and_utc() + Duration::hours(23);
        Self::new(first, last)
    }

    /// Parse a `YYYYMMDD` date pair
    pub fn parse_dates(start: &str, end: &str) -> Result<Self, PipelineError> {
        let start = parse_yyyymmdd(start).map_err(PipelineError::InvalidWindow)?;
        let end = parse_yyyymmdd(end).map_err(PipelineError::InvalidWindow)?;
        Self::from_dates(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Last hour in the window
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// First instant after the window
    pub fn end_exclusive(&self) -> DateTime<Utc> {
        self.end + Duration::hours(1)
    }

    pub fn hours(&self) -> i64 {
        (self.end - self.start).num_seconds() / SECS_PER_HOUR + 1
    }

    /// True for any instant inside `[start, end + 1h)`, aligned or not
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end_exclusive()
    }

    pub fn iter_hours(&self) -> impl Iterator<Item = DateTime<Utc>> {
        let start = self.start;
        (0..self.hours()).map(move |i| start + Duration::hours(i))
    }

    /// Split into consecutive sub-windows of at most `chunk_hours` hours
    pub fn chunks(&self, chunk_hours: i64) -> Vec<HourWindow> {
        let chunk_hours = chunk_hours.max(1);
        let mut chunks = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            let chunk_end = (cursor + Duration::hours(chunk_hours - 1)).min(self.end);
            chunks.push(HourWindow {
                start: cursor,
                end: chunk_end,
            });
            cursor = chunk_end + Duration::hours(1);
        }
        chunks
    }
}
