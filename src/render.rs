//! Report output: comfy-table text or JSON

use crate::error::{CostReportError, Result};
use crate::report::PeriodReport;
use comfy_table::{Cell, Table};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// How reports are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = CostReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(CostReportError::Validation {
                field: "output".to_string(),
                reason: format!("Unsupported output format: {}. Use 'text' or 'json'", other),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// `Start | End` table for a period
pub fn period_table(report: &PeriodReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Start", "End"]);
    table.add_row(vec![Cell::new(&report.start), Cell::new(&report.end)]);
    table
}

/// `Instance Type | Hours | Cost` table with a TOTAL footer row
pub fn breakdown_table(report: &PeriodReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Instance Type", "Hours", "Cost"]);

    for row in &report.rows {
        table.add_row(vec![
            Cell::new(&row.instance_type),
            Cell::new(&row.hours),
            Cell::new(&row.cost),
        ]);
    }

    table.add_row(vec![
        Cell::new(""),
        Cell::new("TOTAL"),
        Cell::new(report.formatted_total()),
    ]);
    table
}

/// Write both tables for every period
pub fn write_text<W: Write>(out: &mut W, reports: &[PeriodReport]) -> Result<()> {
    for report in reports {
        writeln!(out, "{}", period_table(report))?;
        writeln!(out, "{}", breakdown_table(report))?;
    }
    Ok(())
}

/// Write all periods as one pretty-printed JSON array
pub fn write_json<W: Write>(out: &mut W, reports: &[PeriodReport]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, reports)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_reports<W: Write>(
    out: &mut W,
    reports: &[PeriodReport],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(out, reports),
        OutputFormat::Json => write_json(out, reports),
    }
}
