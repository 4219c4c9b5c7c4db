//! Config command - inspect the effective configuration

use clap::Subcommand;
use colored::Colorize;
use rivulet_config::AppConfig;

use crate::error::CliResult;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    #[command(name = "show", about = "Show the effective configuration")]
    Show,

    /// Check the configuration and report the first problem
    #[command(name = "validate", about = "Validate the configuration")]
    Validate,
}

impl ConfigCommand {
    pub fn execute(&self, config: &AppConfig) -> CliResult<()> {
        match self {
            ConfigCommand::Show => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            ConfigCommand::Validate => {
                config.validate()?;
                println!("{} Configuration is valid", "✓".green());
                println!("  Application:     {}", config.application_id.bold());
                println!("  Window size:     {}ms", config.engine.window_size_ms);
                println!("  Commit interval: {}ms", config.engine.commit_interval_ms);
                println!("  On record error: {}", config.engine.on_record_error);
            }
        }
        Ok(())
    }
}
