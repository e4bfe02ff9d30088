// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Where a node wants its input buffers to live before `refresh` runs.
///
/// - `DontCare`: inputs are handed over wherever they currently reside.
/// - `Cpu`: every input is made host-accessible first.
/// - `Gpu`: every input is made device-accessible first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecLocation {
    #[default]
    #[serde(alias = "any")]
    DontCare,
    Cpu,
    Gpu,
}

impl FromStr for ExecLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dontcare" | "any" => Ok(ExecLocation::DontCare),
            "cpu" => Ok(ExecLocation::Cpu),
            "gpu" => Ok(ExecLocation::Gpu),
            other => Err(format!(
                "invalid execution location: {other} (expected \"dontcare\", \"cpu\" or \"gpu\")"
            )),
        }
    }
}

impl fmt::Display for ExecLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecLocation::DontCare => "dontcare",
            ExecLocation::Cpu => "cpu",
            ExecLocation::Gpu => "gpu",
        };
        f.write_str(s)
    }
}

/// Log level as accepted by the config file and `FILTERGRAPH_LOG`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("invalid log level: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_location_parses_case_insensitively() {
        assert_eq!("GPU".parse::<ExecLocation>(), Ok(ExecLocation::Gpu));
        assert_eq!(" cpu ".parse::<ExecLocation>(), Ok(ExecLocation::Cpu));
        assert_eq!("any".parse::<ExecLocation>(), Ok(ExecLocation::DontCare));
        assert!("fpga".parse::<ExecLocation>().is_err());
    }

    #[test]
    fn log_level_accepts_warning_alias() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
