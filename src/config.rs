use crate::dates::{validate_lookback_months, DEFAULT_LOOKBACK_MONTHS};
use crate::error::{ConfigError, Result};
use crate::rates::DEFAULT_RATES_FILE;
use crate::render::OutputFormat;
use crate::retry::DEFAULT_MAX_ATTEMPTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Local config file name, looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = ".ec2cost.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aws: AwsConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Named credentials profile
    pub profile: String,
    /// Region for the Cost Explorer endpoint
    pub region: String,
    /// Attempts per page request when throttled
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub rates_file: PathBuf,
    pub lookback_months: u32,
    pub output: OutputFormat,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            profile: "dev".to_string(),
            region: "us-east-1".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            rates_file: PathBuf::from(DEFAULT_RATES_FILE),
            lookback_months: DEFAULT_LOOKBACK_MONTHS,
            output: OutputFormat::Text,
        }
    }
}

/// Values given on the command line; `None` keeps the config value
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub rates_file: Option<PathBuf>,
    pub months: Option<u32>,
    pub output: Option<String>,
}

/// Everything one report run needs
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub profile: String,
    pub region: String,
    pub max_attempts: u32,
    pub rates_file: PathBuf,
    pub lookback_months: u32,
    pub output: OutputFormat,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            // Try .ec2cost.toml in current dir, then ~/.config/ec2cost/config.toml
            let local = PathBuf::from(LOCAL_CONFIG_FILE);
            if local.exists() {
                local
            } else {
                dirs::config_dir()
                    .map(|d| d.join("ec2cost").join("config.toml"))
                    .unwrap_or(local)
            }
        };

        if config_path.exists() {
            debug!("Loading config from {}", config_path.display());
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Unreadable {
                    path: config_path.display().to_string(),
                    reason: e.to_string(),
                })?;
            let config: Config = toml::from_str(&content).map_err(|e| {
                ConfigError::ParseError(format!(
                    "{}: {}\n  Tip: Run 'ec2cost init' to create a new config file",
                    config_path.display(),
                    e
                ))
            })?;
            config.validate()?;
            Ok(config)
        } else {
            // Use defaults but warn if user explicitly provided a path
            if path.is_some() {
                eprintln!("WARNING: Config file not found: {}", config_path.display());
                eprintln!("   Using default configuration. Run 'ec2cost init' to create a config file.");
            }
            Ok(Config::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_lookback_months(self.report.lookback_months).map_err(|e| {
            ConfigError::InvalidValue {
                field: "report.lookback_months".to_string(),
                reason: e.to_string(),
            }
        })?;
        if self.aws.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "aws.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.aws.profile.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "aws.profile".to_string(),
                reason: "cannot be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Apply command-line overrides on top of this config
    pub fn resolve(&self, overrides: Overrides) -> Result<ReportSettings> {
        let output = match overrides.output {
            Some(raw) => raw.parse::<OutputFormat>()?,
            None => self.report.output,
        };
        let lookback_months = overrides.months.unwrap_or(self.report.lookback_months);
        validate_lookback_months(lookback_months)?;

        Ok(ReportSettings {
            profile: overrides.profile.unwrap_or_else(|| self.aws.profile.clone()),
            region: overrides.region.unwrap_or_else(|| self.aws.region.clone()),
            max_attempts: self.aws.max_attempts,
            rates_file: overrides
                .rates_file
                .unwrap_or_else(|| self.report.rates_file.clone()),
            lookback_months,
            output,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
