// src/config/validate.rs

use crate::config::model::{ConfigFile, ExecutorConfig, RawConfigFile};
use crate::errors::{FilterGraphError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FilterGraphError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_executor_config(&raw.executor)?;
        Ok(ConfigFile::new_unchecked(raw.executor, raw.logging))
    }
}

/// Check the invariants the worker pool relies on.
///
/// Also called by `FilterGraphExecutor::new`, since an `ExecutorConfig` can be
/// built by hand without going through a config file.
pub fn validate_executor_config(cfg: &ExecutorConfig) -> Result<()> {
    if cfg.workers == 0 {
        return Err(FilterGraphError::ConfigError(
            "[executor].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.idle_timeout_ms == 0 {
        return Err(FilterGraphError::ConfigError(
            "[executor].idle_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.thread_name.trim().is_empty() {
        return Err(FilterGraphError::ConfigError(
            "[executor].thread_name must not be empty".to_string(),
        ));
    }

    Ok(())
}
