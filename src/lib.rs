//! ec2cost library
//!
//! Monthly EC2 running-hours report from AWS Cost Explorer, with costs for
//! reserved usage rebuilt from a local rate table.

pub mod config;
pub mod cost_explorer;
pub mod dates;
pub mod error;
pub mod exit_codes;
pub mod rates;
pub mod render;
pub mod report;
pub mod retry;
pub mod usage;
pub mod workflow;

// Re-export commonly used types
pub use error::{CostReportError, Result};
pub use rates::RateTable;
pub use report::{PeriodReport, ReportRow};
pub use usage::{UsageGroup, UsagePeriod, UsageSource};
