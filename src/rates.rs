//! Static hourly rate table
//!
//! Rates come from a headerless two-column CSV (`instance_type,rate_per_hour`).
//! Values are kept as the strings found in the file and are only parsed when
//! a report needs them.

use crate::error::{CostReportError, Result};
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::debug;

/// Default rate file name, looked up in the working directory
pub const DEFAULT_RATES_FILE: &str = "costs.csv";

/// Instance type → hourly rate (decimal USD, unparsed)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateTable {
    rates: HashMap<String, String>,
}

impl RateTable {
    /// Load rates from a CSV file
    ///
    /// # Errors
    /// `RatesFile` if the file cannot be opened, `MalformedRate` for the first
    /// row that is not valid CSV or has fewer than two fields.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = Self::builder()
            .from_path(path)
            .map_err(|source| CostReportError::RatesFile {
                path: path.to_path_buf(),
                source,
            })?;
        let table = Self::read_records(reader)?;
        debug!("Loaded {} rates from {}", table.len(), path.display());
        Ok(table)
    }

    /// Load rates from any reader (same format as `load`)
    pub fn from_reader<R: io::Read>(rdr: R) -> Result<Self> {
        Self::read_records(Self::builder().from_reader(rdr))
    }

    fn builder() -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder.has_headers(false).flexible(true).trim(Trim::All);
        builder
    }

    fn read_records<R: io::Read>(reader: csv::Reader<R>) -> Result<Self> {
        let mut rates = HashMap::new();

        for (index, record) in reader.into_records().enumerate() {
            let fallback_line = index as u64 + 1;
            let record = record.map_err(|e| CostReportError::MalformedRate {
                line: e.position().map(|p| p.line()).unwrap_or(fallback_line),
                reason: e.to_string(),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);

            // Whitespace-only lines
            if record.iter().all(str::is_empty) {
                continue;
            }

            if record.len() < 2 {
                return Err(CostReportError::MalformedRate {
                    line,
                    reason: format!("expected 2 fields, found {}", record.len()),
                });
            }

            let instance_type = &record[0];
            let rate = &record[1];
            if instance_type.is_empty() {
                return Err(CostReportError::MalformedRate {
                    line,
                    reason: "instance type is empty".to_string(),
                });
            }
            if rate.is_empty() {
                return Err(CostReportError::MalformedRate {
                    line,
                    reason: format!("rate for {} is empty", instance_type),
                });
            }

            // Later rows win
            rates.insert(instance_type.to_string(), rate.to_string());
        }

        Ok(Self { rates })
    }

    /// Rate string for an instance type
    pub fn get(&self, instance_type: &str) -> Option<&str> {
        self.rates.get(instance_type).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            rates: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
