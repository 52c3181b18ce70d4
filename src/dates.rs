//! Reporting window computation
//!
//! The report covers whole calendar months: the window ends at the first
//! day of the current month (exclusive) and starts a number of months
//! before that (inclusive). The current time comes from a `Clock` so the
//! window can be pinned in tests.

use crate::error::{CostReportError, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default lookback length in months
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 12;

/// Cost Explorer keeps at most 38 months of history (with extended history enabled)
pub const MAX_LOOKBACK_MONTHS: u32 = 38;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Half-open date range `[start, end)` in `YYYY-MM-DD` form on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start_str(), self.end_str())
    }
}

/// Check a lookback length against what Cost Explorer can answer
pub fn validate_lookback_months(months: u32) -> Result<()> {
    if months == 0 || months > MAX_LOOKBACK_MONTHS {
        return Err(CostReportError::Validation {
            field: "months".to_string(),
            reason: format!(
                "Lookback must be between 1 and {} months, got: {}",
                MAX_LOOKBACK_MONTHS, months
            ),
        });
    }
    Ok(())
}

/// Window of `months` whole months ending at the first day of the current month
pub fn lookback_interval(clock: &dyn Clock, months: u32) -> Result<DateInterval> {
    validate_lookback_months(months)?;

    let now = clock.now();
    let end = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).ok_or_else(|| {
        CostReportError::Validation {
            field: "now".to_string(),
            reason: format!("No first-of-month date for {}", now),
        }
    })?;
    let start = end
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| CostReportError::Validation {
            field: "months".to_string(),
            reason: format!("{} months before {} is out of range", months, end),
        })?;

    Ok(DateInterval { start, end })
}
