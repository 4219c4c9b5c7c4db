//! Run command - execute a demo topology over a JSON-lines input file
//!
//! The input is split into partition groups by city, the key both topologies
//! aggregate on; each group gets its own topology instance and state store
//! shard and runs on its own task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Subcommand};
use colored::Colorize;
use processor::{
    run_partition_groups, DriverMetrics, DriverStats, EngineConfig, InMemorySource,
    MemoryStateBackend, MetricsRegistry, RawRecord, Sink, StateBackend, StopHandle,
    StreamDriver, Topology, TracingSink,
};
use rivulet_config::AppConfig;
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::input::{partition_records, read_records};
use crate::pipelines::transactions::{TransactionSinks, MASKED_LABEL};
use crate::pipelines::{city_orders, city_partition_key, transactions};
use crate::sinks::ConsoleSink;

/// Run command variants
#[derive(Subcommand, Debug, Clone)]
pub enum RunCommand {
    /// Aggregate order count and revenue per city
    #[command(name = "city-orders", about = "Run the city-wise order aggregation")]
    CityOrders {
        #[command(flatten)]
        options: RunOptions,
    },

    /// Route, enrich and aggregate transactions
    #[command(name = "transactions", about = "Run the transaction monitoring topology")]
    Transactions {
        #[command(flatten)]
        options: RunOptions,
    },
}

/// Options shared by every topology
#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    /// JSON-lines input file, one `{key, value, timestamp}` object per line
    #[arg(long, short = 'i', value_name = "FILE")]
    pub input: PathBuf,

    /// Number of partition groups to run in parallel
    #[arg(long, short = 'p', default_value_t = 1)]
    pub partitions: usize,

    /// Override the commit interval (0 commits after every record)
    #[arg(long, value_name = "MS")]
    pub commit_interval_ms: Option<u64>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,

    /// Do not print output records
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Statistics per partition group, in group order
    pub groups: Vec<DriverStats>,
    /// Statistics summed over all groups
    pub total: DriverStats,
    /// Prometheus text exposition of the run's metrics
    pub metrics: String,
}

impl RunCommand {
    pub fn options(&self) -> &RunOptions {
        match self {
            RunCommand::CityOrders { options } | RunCommand::Transactions { options } => options,
        }
    }

    pub fn input_topic(&self) -> &'static str {
        match self {
            RunCommand::CityOrders { .. } => city_orders::INPUT_TOPIC,
            RunCommand::Transactions { .. } => transactions::INPUT_TOPIC,
        }
    }

    /// Execute the run command
    pub async fn execute(&self, config: &AppConfig, stop: StopHandle) -> CliResult<()> {
        let options = self.options();
        let records = read_records(&options.input).await?;

        println!(
            "{} {} ({} records from {} as {})",
            "Running".bold().cyan(),
            self.topology_name().bold(),
            records.len(),
            options.input.display(),
            self.input_topic()
        );

        let sink: Arc<dyn Sink> = if options.quiet {
            Arc::new(ConsoleSink::quiet())
        } else {
            Arc::new(ConsoleSink::new())
        };

        let started = Instant::now();
        let report = self.run_records(records, config, sink, stop).await?;
        let elapsed = started.elapsed().as_secs_f64();

        print_summary(&report, elapsed);
        if options.metrics {
            println!();
            println!("{}", "Metrics:".bold().cyan());
            print!("{}", report.metrics);
        }

        Ok(())
    }

    /// Run the topology over `records`, publishing every output topic to `output`
    pub async fn run_records(
        &self,
        records: Vec<RawRecord>,
        config: &AppConfig,
        output: Arc<dyn Sink>,
        stop: StopHandle,
    ) -> CliResult<RunReport> {
        let options = self.options();
        if options.partitions == 0 {
            return Err(CliError::InvalidArgument(
                "--partitions must be at least 1".to_string(),
            ));
        }

        let engine = self.engine_config(config);
        engine
            .validate()
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

        let registry = MetricsRegistry::new();
        let metrics = DriverMetrics::register(&registry);

        let mut drivers = Vec::with_capacity(options.partitions);
        for (index, group) in partition_records(records, options.partitions, city_partition_key)
            .into_iter()
            .enumerate()
        {
            let partition = u32::try_from(index)
                .map_err(|_| CliError::InvalidArgument(format!("too many partitions: {}", index)))?;
            let topology = self.build_topology(config, output.clone())?;

            drivers.push(
                StreamDriver::new(topology, InMemorySource::from_records(group), engine.clone())
                    .with_partition(partition)
                    .with_metrics(metrics.clone())
                    .with_stop_handle(stop.clone()),
            );
        }

        info!(
            topology = self.topology_name(),
            partitions = drivers.len(),
            commit_interval_ms = engine.commit_interval_ms,
            "Starting partition groups"
        );

        let groups = run_partition_groups(drivers).await?;
        output.flush().await?;

        let total = DriverStats::combine(&groups);
        let metrics = registry
            .encode()
            .map_err(|e| CliError::Metrics(e.to_string()))?;

        Ok(RunReport {
            groups,
            total,
            metrics,
        })
    }

    /// Engine settings after topology defaults and command-line overrides
    pub fn engine_config(&self, config: &AppConfig) -> EngineConfig {
        let engine = match self {
            RunCommand::CityOrders { .. } => config.engine.clone(),
            RunCommand::Transactions { .. } => transactions::engine_config(&config.engine),
        };

        match self.options().commit_interval_ms {
            Some(interval) => engine.with_commit_interval_ms(interval),
            None => engine,
        }
    }

    fn topology_name(&self) -> &'static str {
        match self {
            RunCommand::CityOrders { .. } => "city-orders",
            RunCommand::Transactions { .. } => "transactions",
        }
    }

    fn build_topology(&self, config: &AppConfig, output: Arc<dyn Sink>) -> CliResult<Topology> {
        let backend: Arc<dyn StateBackend> = Arc::new(MemoryStateBackend::new());

        let topology = match self {
            RunCommand::CityOrders { .. } => {
                city_orders::build(output, backend, &config.application_id)?
            }
            RunCommand::Transactions { .. } => transactions::build(
                TransactionSinks {
                    output,
                    masked: Arc::new(TracingSink::new(MASKED_LABEL)),
                },
                backend,
                &config.application_id,
                &config.engine,
            )?,
        };

        Ok(topology)
    }
}

fn print_summary(report: &RunReport, elapsed_seconds: f64) {
    let total = &report.total;

    println!();
    println!("{}", "Run Summary:".bold().cyan());
    println!(
        "  {} {} records processed in {:.2}s ({:.0} records/s)",
        "✓".green(),
        total.records_processed,
        elapsed_seconds,
        total.records_per_second(elapsed_seconds)
    );
    if total.records_skipped > 0 {
        println!("  {} {} records skipped", "!".yellow(), total.records_skipped);
    }
    if total.late_records_dropped > 0 {
        println!(
            "  {} {} late records dropped",
            "!".yellow(),
            total.late_records_dropped
        );
    }
    println!("  Windows emitted:   {}", total.windows_emitted);
    println!("  Offset commits:    {}", total.commits);

    if report.groups.len() > 1 {
        for (partition, stats) in report.groups.iter().enumerate() {
            println!(
                "  Partition {}: {} processed, {} skipped, last committed offset {}",
                partition,
                stats.records_processed,
                stats.records_skipped,
                stats
                    .last_committed_offset
                    .map_or_else(|| "-".to_string(), |offset| offset.to_string())
            );
        }
    }
}
