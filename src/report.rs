//! Per-period cost report
//!
//! Cost Explorer reports an unblended cost of zero for hours covered by
//! reservations or savings plans. For those rows the on-demand equivalent is
//! rebuilt from the local rate table (`rate × hours`); every other row uses
//! the reported cost as-is.

use crate::rates::RateTable;
use crate::usage::{UsageGroup, UsagePeriod};
use serde::{Serialize, Serializer};
use tracing::warn;

/// One rendered row of the breakdown table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub instance_type: String,
    /// Literal usage quantity from the API
    pub hours: String,
    pub cost: String,
}

/// Breakdown of one monthly period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub start: String,
    pub end: String,
    pub rows: Vec<ReportRow>,
    #[serde(serialize_with = "serialize_amount")]
    pub total: f64,
}

impl PeriodReport {
    pub fn formatted_total(&self) -> String {
        format_amount(self.total)
    }
}

fn serialize_amount<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_amount(*value))
}

/// Fixed four-decimal rendering used for computed costs and totals
pub fn format_amount(value: f64) -> String {
    format!("{:.4}", value)
}

fn parse_float(field: &str, raw: &str, instance_type: &str) -> f64 {
    raw.parse::<f64>().unwrap_or_else(|e| {
        warn!("Invalid {} {:?} for {}: {}, using 0", field, raw, instance_type, e);
        0.0
    })
}

fn parse_reported_cost(raw: &str, instance_type: &str) -> i64 {
    raw.parse::<i64>().unwrap_or_else(|e| {
        warn!("Reported cost {:?} for {} is not an integer: {}, using 0", raw, instance_type, e);
        0
    })
}

/// Price one instance-type group
///
/// Returns the rendered row and the amount it adds to the period total.
pub fn price_group(group: &UsageGroup, rates: &RateTable) -> (ReportRow, f64) {
    let instance_type = group.instance_type.as_str();
    let hours = parse_float("usage quantity", &group.usage_quantity, instance_type);

    let rate = match rates.get(instance_type) {
        Some(rate) => parse_float("rate", rate, instance_type),
        None => {
            warn!("No rate for {}, using 0", instance_type);
            0.0
        }
    };
    let computed_cost = rate * hours;

    let reported_cost = parse_reported_cost(&group.unblended_cost, instance_type);

    let (cost, contribution) = if reported_cost == 0 {
        (format_amount(computed_cost), computed_cost)
    } else {
        (group.unblended_cost.clone(), reported_cost as f64)
    };

    let row = ReportRow {
        instance_type: group.instance_type.clone(),
        hours: group.usage_quantity.clone(),
        cost,
    };
    (row, contribution)
}

/// Build the breakdown for one period
pub fn build_period_report(period: &UsagePeriod, rates: &RateTable) -> PeriodReport {
    let mut rows = Vec::with_capacity(period.groups.len());
    let mut total = 0.0;

    for group in &period.groups {
        let (row, contribution) = price_group(group, rates);
        total += contribution;
        rows.push(row);
    }

    PeriodReport {
        start: period.start.clone(),
        end: period.end.clone(),
        rows,
        total,
    }
}

/// Build reports for all periods, keeping API order
pub fn build_reports(periods: &[UsagePeriod], rates: &RateTable) -> Vec<PeriodReport> {
    periods
        .iter()
        .map(|period| build_period_report(period, rates))
        .collect()
}
