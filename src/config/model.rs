// src/config/model.rs

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use crate::types::LogLevel;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [executor]
/// workers = 4
/// idle_timeout_ms = 50
/// thread_name = "filtergraph-worker"
///
/// [logging]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Worker pool settings from `[executor]`.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// `[logging]` section.
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Validated configuration. Build one with `ConfigFile::try_from(raw)` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub executor: ExecutorConfig,
    pub logging: LoggingSection,
}

impl ConfigFile {
    /// Construct without running validation. Only `validate.rs` should call
    /// this.
    pub(crate) fn new_unchecked(executor: ExecutorConfig, logging: LoggingSection) -> Self {
        Self { executor, logging }
    }
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Number of worker threads. Fixed for the lifetime of the executor.
    ///
    /// Defaults to the available hardware parallelism.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound on how long an idle worker sleeps before re-checking for
    /// shutdown, in milliseconds.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Prefix for worker thread names; the worker index is appended.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_idle_timeout_ms() -> u64 {
    50
}

fn default_thread_name() -> String {
    "filtergraph-worker".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            idle_timeout_ms: default_idle_timeout_ms(),
            thread_name: default_thread_name(),
        }
    }
}

impl ExecutorConfig {
    /// Default settings with an explicit pool size.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSection {
    /// If `None`, `FILTERGRAPH_LOG` or `info` is used.
    #[serde(default)]
    pub level: Option<LogLevel>,
}
