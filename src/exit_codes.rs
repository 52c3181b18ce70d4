//! Exit code standardization for ec2cost
//!
//! ## Exit Code Convention
//!
//! - `0` = Success
//! - `1` = User error (invalid flag values)
//! - `2` = System error (Cost Explorer failure, network error, output I/O)
//! - `3` = Configuration error (config file, rates file)

use crate::error::CostReportError;

/// Standard exit codes for ec2cost
pub mod codes {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// User error (invalid input, validation failure)
    pub const USER_ERROR: i32 = 1;
    /// System error (AWS API failure, network error)
    pub const SYSTEM_ERROR: i32 = 2;
    /// Configuration error (config file, rates file)
    pub const CONFIG_ERROR: i32 = 3;
}

/// Map a CostReportError to an appropriate exit code
pub fn exit_code_for_error(error: &CostReportError) -> i32 {
    use CostReportError::*;
    match error {
        // Configuration errors
        Config(_) => codes::CONFIG_ERROR,
        RatesFile { .. } => codes::CONFIG_ERROR,
        MalformedRate { .. } => codes::CONFIG_ERROR,

        // User errors
        Validation { .. } => codes::USER_ERROR,

        // System errors (cloud provider, network, I/O)
        CloudProvider { .. } => codes::SYSTEM_ERROR,
        Retryable { .. } => codes::SYSTEM_ERROR,
        Aws(_) => codes::SYSTEM_ERROR,
        Io(_) => codes::SYSTEM_ERROR,
        Json(_) => codes::SYSTEM_ERROR,
    }
}

/// Exit code for an error that reached `main` through `anyhow`
///
/// Errors that did not originate as a `CostReportError` count as user errors.
pub fn exit_code_for_anyhow(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<CostReportError>()
        .map(exit_code_for_error)
        .unwrap_or(codes::USER_ERROR)
}

/// Exit code for a command-line parse failure
///
/// `--help` and `--version` come back from clap as errors but are not
/// failures; everything else is a bad flag or value.
pub fn exit_code_for_clap(error: &clap::Error) -> i32 {
    if error.use_stderr() {
        codes::USER_ERROR
    } else {
        codes::SUCCESS
    }
}
