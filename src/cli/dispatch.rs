use super::config::cmd_config;
use super::env::CliArgs;
use super::extract::cmd_extract;
use super::resolve::cmd_resolve;
use super::run::cmd_run;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Extract(args) => cmd_extract(args, ctx, &cli.output),
        Commands::Resolve(args) => cmd_resolve(args, ctx, &cli.output).await,
        Commands::Run(args) => cmd_run(args, ctx, &cli.output).await,
        Commands::Config(args) => cmd_config(args, ctx),
    }
}
