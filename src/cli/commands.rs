use clap::Subcommand;

use super::config::ConfigArgs;
use super::extract::ExtractArgs;
use super::resolve::ResolveArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Extract the action slot from an instruction
    Extract(ExtractArgs),

    /// Resolve an instruction against a recorded page snapshot
    Resolve(ResolveArgs),

    /// Execute test cases against a recorded page snapshot
    Run(RunArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
