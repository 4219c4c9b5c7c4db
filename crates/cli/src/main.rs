//! rivulet CLI
//!
//! Runs the demo stream topologies over JSON-lines input files and generates
//! synthetic transaction data.

use clap::{Parser, Subcommand};
use colored::Colorize;
use processor::StopHandle;
use rivulet_cli::{
    commands::{ConfigCommand, GenerateArgs, RunCommand},
    CliError, CliResult,
};
use rivulet_config::{AppConfig, ObservabilityConfig};
use tracing::warn;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "rivulet",
    version,
    about = "Single-process stream processing over keyed, timestamped records",
    long_about = "Runs stream topologies over JSON-lines input.\n\n\
                  Topologies:\n\
                  - city-orders: running order count and revenue per city\n\
                  - transactions: risk routing, windowed counts, enrichment and masking"
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,

    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Path to a YAML configuration file"
    )]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic transactions
    #[command(name = "generate", about = "Generate synthetic transactions as JSON lines")]
    Generate(GenerateArgs),

    /// Run a topology
    #[command(name = "run", about = "Run a demo topology over an input file")]
    Run {
        #[command(subcommand)]
        command: RunCommand,
    },

    /// Configuration management
    #[command(name = "config", about = "Inspect the effective configuration")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.clone())?;
    init_tracing(&config.observability, cli.verbose)?;

    match cli.command {
        Commands::Generate(args) => args.execute(&config).await,
        Commands::Run { command } => {
            config.validate()?;

            let stop = StopHandle::new();
            let on_interrupt = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping after the current record");
                    on_interrupt.stop();
                }
            });

            command.execute(&config, stop).await
        }
        Commands::Config { command } => command.execute(&config),
    }
}

/// Initialize tracing/logging
///
/// `RUST_LOG` wins over the configured level; `--verbose` wins over both.
/// Logs go to stderr so stdout carries only records and summaries.
fn init_tracing(observability: &ObservabilityConfig, verbose: bool) -> CliResult<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&observability.log_level))
            .map_err(|e| {
                CliError::InvalidArgument(format!(
                    "invalid log level '{}': {}",
                    observability.log_level, e
                ))
            })?
    };

    let json_layer = observability
        .json_logging
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!observability.json_logging)
        .then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    Ok(())
}
