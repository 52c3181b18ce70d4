use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ec2cost::config::{init_config, Config, Overrides, LOCAL_CONFIG_FILE};
use ec2cost::cost_explorer::{load_sdk_config, CostExplorerSource};
use ec2cost::dates::SystemClock;
use ec2cost::exit_codes::{exit_code_for_anyhow, exit_code_for_clap};
use ec2cost::rates::RateTable;
use ec2cost::workflow::generate_report;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ec2cost")]
#[command(
    about = "Monthly EC2 running-hours cost report from AWS Cost Explorer",
    long_about = "ec2cost prints one table per month for the last year of EC2 running hours.\n\nRows with a reported unblended cost of zero (reserved or committed usage)\nare priced from a local rate file (instance_type,rate_per_hour)."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// AWS credentials profile [default: dev]
    #[arg(long, env = "EC2COST_PROFILE")]
    profile: Option<String>,

    /// Region for the Cost Explorer client [default: us-east-1]
    #[arg(long)]
    region: Option<String>,

    /// Hourly rate CSV (instance_type,rate_per_hour) [default: costs.csv]
    #[arg(long)]
    rates_file: Option<PathBuf>,

    /// Number of whole months to report [default: 12]
    #[arg(long)]
    months: Option<u32>,

    /// Output format (text, json)
    #[arg(long)]
    output: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = LOCAL_CONFIG_FILE)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(exit_code_for_clap(&e));
        }
    };

    // Logs go to stderr so they never interleave with the tables on stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(exit_code_for_anyhow(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Init { output }) = cli.command {
        init_config(&output)?;
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let settings = config.resolve(Overrides {
        profile: cli.profile,
        region: cli.region,
        rates_file: cli.rates_file,
        months: cli.months,
        output: cli.output,
    })?;
    debug!("Report settings: {:?}", settings);

    let rates = RateTable::load(&settings.rates_file)?;
    if rates.is_empty() {
        warn!(
            "Rate file {} is empty, zero-cost rows will show 0.0000",
            settings.rates_file.display()
        );
    }

    let aws_config = load_sdk_config(&settings.profile, &settings.region).await;
    let source = CostExplorerSource::new(&aws_config, settings.max_attempts);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    generate_report(
        &source,
        &rates,
        &SystemClock,
        settings.lookback_months,
        settings.output,
        &mut out,
    )
    .await
    .context("Failed to generate cost report")?;

    Ok(())
}
