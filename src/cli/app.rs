use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{
    init_logging, load_config, load_local_env_overrides, log_config_source, LoadedConfig,
};

pub async fn run() -> Result<()> {
    load_local_env_overrides();
    let cli = CliArgs::parse();

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    let level = if cli.log_level_explicit() {
        cli.log_level.clone()
    } else {
        config.log_level.clone()
    };
    init_logging(&level, cli.debug)?;

    info!("Starting uifunnel v{}", env!("CARGO_PKG_VERSION"));
    log_config_source(path.as_deref());
    let cli_context = CliContext::new(config, path);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
