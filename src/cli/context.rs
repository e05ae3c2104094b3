use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    /// File the configuration was read from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
