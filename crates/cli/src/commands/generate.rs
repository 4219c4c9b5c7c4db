//! Generate command - write synthetic transactions as JSON lines

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use rivulet_config::{AppConfig, GeneratorConfig};

use crate::error::CliResult;
use crate::generator::TransactionGenerator;

#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Number of transactions (defaults to `generator.count`)
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Event-time gap between transactions in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Write to this file instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Timestamp of the first transaction in epoch milliseconds
    #[arg(long, value_name = "MS")]
    pub start_time_ms: Option<i64>,
}

impl GenerateArgs {
    /// Generator settings with command-line values taking precedence
    pub fn generator_config(&self, base: &GeneratorConfig) -> GeneratorConfig {
        GeneratorConfig {
            count: self.count.unwrap_or(base.count),
            interval_ms: self.interval_ms.unwrap_or(base.interval_ms),
            seed: self.seed.or(base.seed),
            start_time_ms: self.start_time_ms.or(base.start_time_ms),
        }
    }

    /// Render the generated transactions as JSON lines
    pub fn render(&self, config: &AppConfig) -> CliResult<String> {
        let generator_config = self.generator_config(&config.generator);
        generator_config.validate()?;

        let records = TransactionGenerator::new(&generator_config).generate(generator_config.count)?;

        let mut lines = String::new();
        for record in &records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }
        Ok(lines)
    }

    pub async fn execute(&self, config: &AppConfig) -> CliResult<()> {
        let lines = self.render(config)?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, &lines).await?;
                println!(
                    "{} Wrote {} transactions to {}",
                    "✓".green(),
                    lines.lines().count(),
                    path.display()
                );
            }
            None => print!("{}", lines),
        }

        Ok(())
    }
}
