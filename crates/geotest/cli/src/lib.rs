//! geotest CLI - runs raster driver conformance scripts
//!
//! Every `*.toml` script in the given directories is run against the
//! built-in drivers. The exit code is the number of failed tests, capped at
//! 255.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use geotest_driver::DriverManager;
use geotest_harness::{clean_tmp, HarnessConfig, ReportAggregator, RunOptions, UtilityLocator};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

pub use output::OutputFormat;

/// geotest CLI application
#[derive(Parser)]
#[command(name = "geotest")]
#[command(about = "Raster driver conformance harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every script in the given directories
    Run {
        /// Script directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Config option forwarded to the drivers
        #[arg(short, long = "config", value_name = "KEY=VALUE")]
        config: Vec<String>,

        /// Keep scratch datasets after each check
        #[arg(long)]
        keep_artifacts: bool,

        /// Harness configuration file
        #[arg(long, env = "GEOTEST_CONFIG", value_name = "PATH")]
        config_file: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// List registered drivers and their capabilities
    Drivers {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Empty a scratch directory
    CleanTmp {
        dir: PathBuf,
    },

    /// Find an external utility
    Locate {
        utility: String,

        /// Source tree whose apps/ directory is searched first
        #[arg(long, value_name = "DIR")]
        source_tree: Option<PathBuf>,
    },
}

/// Every driver this binary ships with.
pub fn driver_manager() -> DriverManager {
    let mut manager = DriverManager::new();
    geotest_jras::register(&mut manager);
    manager
}

/// Run using the current process arguments. Returns the exit code.
pub fn run() -> anyhow::Result<u8> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> anyhow::Result<u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let filter = if cli.verbose { "debug" } else { "warn" };
    // A second initialisation (tests calling this repeatedly) is harmless.
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(io::stderr))
        .try_init();

    match cli.command {
        Commands::Run {
            dirs,
            config,
            keep_artifacts,
            config_file,
            output,
        } => {
            let options = RunOptions {
                keep_artifacts,
                ..RunOptions::default()
            }
            .with_config_pairs(&config)
            .map_err(|pair| anyhow!("expected KEY=VALUE, got `{}`", pair))?;
            let harness_config = match &config_file {
                Some(path) => HarnessConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => HarnessConfig::from_env(),
            };
            run_scripts(&dirs, &options, harness_config, output)
        }
        Commands::Drivers { output } => {
            let mut stdout = io::stdout().lock();
            output::write_drivers(&mut stdout, &driver_manager(), output)?;
            Ok(0)
        }
        Commands::CleanTmp { dir } => {
            clean_tmp(&dir).with_context(|| format!("cleaning {}", dir.display()))?;
            Ok(0)
        }
        Commands::Locate {
            utility,
            source_tree,
        } => {
            let mut locator = match source_tree {
                Some(tree) => UtilityLocator::new().with_source_tree(tree),
                None => UtilityLocator::new(),
            };
            match locator.locate(&utility) {
                Some(path) => {
                    println!("{}", path.display());
                    Ok(0)
                }
                None => {
                    eprintln!("{} not found", utility);
                    Ok(1)
                }
            }
        }
    }
}

fn run_scripts(
    dirs: &[PathBuf],
    options: &RunOptions,
    config: HarnessConfig,
    format: OutputFormat,
) -> anyhow::Result<u8> {
    let manager = Arc::new(driver_manager());
    let failures = match format {
        OutputFormat::Text => {
            let mut report = ReportAggregator::new(manager, config);
            report.run_all(dirs, options)?
        }
        OutputFormat::Json => {
            let mut report = ReportAggregator::with_writer(manager, config, io::sink());
            let failures = report.run_all(dirs, options)?;
            let mut stdout = io::stdout().lock();
            output::write_session_json(&mut stdout, report.context())?;
            stdout.flush()?;
            failures
        }
    };
    tracing::info!(failures, "session finished");
    Ok(exit_code(failures))
}

/// Failure count as a process exit code.
pub fn exit_code(failures: usize) -> u8 {
    u8::try_from(failures).unwrap_or(u8::MAX)
}
