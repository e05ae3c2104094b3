use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use super::output::OutputFormat;

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (overrides the configured one when given)
    #[arg(short, long, default_value = DEFAULT_LOG_LEVEL, global = true)]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, default_value = "human", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl CliArgs {
    pub fn log_level_explicit(&self) -> bool {
        self.log_level != DEFAULT_LOG_LEVEL
    }
}
