//! End-to-end report run
//!
//! Window → fetch → price → render. Rates are loaded by the caller so a bad
//! rates file stops the run before any request is made.

use crate::dates::{lookback_interval, Clock};
use crate::error::Result;
use crate::rates::RateTable;
use crate::render::{write_reports, OutputFormat};
use crate::report::{build_reports, PeriodReport};
use crate::usage::UsageSource;
use std::io::Write;
use tracing::info;

/// Fetch usage for the lookback window and write the report
///
/// Nothing is written if the fetch fails.
pub async fn generate_report<W: Write>(
    source: &dyn UsageSource,
    rates: &RateTable,
    clock: &dyn Clock,
    lookback_months: u32,
    format: OutputFormat,
    out: &mut W,
) -> Result<Vec<PeriodReport>> {
    let interval = lookback_interval(clock, lookback_months)?;
    info!("Fetching usage from {} for {}", source.name(), interval);

    let periods = source.fetch_usage(&interval).await?;
    info!("Received {} periods", periods.len());

    let reports = build_reports(&periods, rates);
    write_reports(out, &reports, format)?;
    Ok(reports)
}
