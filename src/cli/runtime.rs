use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

pub const LOCAL_ENV_PATH: &str = "config/local.env";
pub const LOCAL_CONFIG_PATH: &str = "config/config.yaml";

/// Export `KEY=value` lines from `config/local.env` without clobbering the
/// real environment.
pub fn load_local_env_overrides() {
    let path = Path::new(LOCAL_ENV_PATH);
    if !path.exists() {
        return;
    }

    match stdfs::read_to_string(path) {
        Ok(contents) => {
            for (key, value) in parse_env_lines(&contents) {
                if env::var(&key).is_ok() {
                    continue;
                }
                env::set_var(key, value);
            }
        }
        Err(err) => {
            // Logging is not up yet.
            eprintln!("failed to read {}: {}", path.display(), err);
        }
    }
}

fn parse_env_lines(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unescape_value(value.trim())))
        })
        .collect()
}

fn unescape_value(raw: &str) -> String {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')))
        .unwrap_or(raw);
    unquoted.replace("\\n", "\n").replace("\\\"", "\"")
}

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: Option<PathBuf>,
}

/// Resolve, read and validate the configuration.
///
/// An explicit path must exist. Otherwise `./config/config.yaml` is tried,
/// then `<config dir>/uifunnel/config.yaml`, then built-in defaults.
/// `UIFUNNEL_*` environment variables are applied last.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = match config_path {
        Some(path) => Some(path.clone()),
        None => default_config_path(),
    };

    let mut config = match &path {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            AppConfig::from_yaml_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => AppConfig::default(),
    };

    config.apply_env_overrides(|name| env::var(name).ok());
    config
        .validate()
        .context("Configuration invalid after environment overrides")?;

    Ok(LoadedConfig { config, path })
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("uifunnel").join("config.yaml");
    user.exists().then_some(user)
}

/// Report where the configuration came from once logging is up
pub fn log_config_source(path: Option<&Path>) {
    match path {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => warn!("Config file not found, using defaults"),
    }
}
