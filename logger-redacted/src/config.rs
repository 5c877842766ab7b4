// Logger configuration
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::LoggerError;

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "PREDICTOR_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines, colored when stdout is a terminal
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggerError::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub level: String,
    pub format: LogFormat,
    /// Crates whose events pass the default filter at `level`
    pub targets: Vec<String>,
    /// Write events to stderr instead of stdout
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            targets: Vec::new(),
            stderr: false,
        }
    }
}

impl LoggerConfig {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Like [`LoggerConfig::new`], with the format taken from
    /// `PREDICTOR_LOG_FORMAT` when set.
    ///
    /// # Errors
    ///
    /// Fails when the variable holds an unknown format name.
    pub fn from_env<I, S>(targets: I) -> Result<Self, LoggerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::new(targets);
        if let Ok(raw) = env::var(LOG_FORMAT_ENV) {
            config.format = raw.parse()?;
        }
        Ok(config)
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn log_to_stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }

    /// Filter directives used when `RUST_LOG` is not set.
    pub fn default_directives(&self) -> String {
        self.targets
            .iter()
            .map(|target| format!("{}={}", target.replace('-', "_"), self.level))
            .chain(std::iter::once("tower_http=info".to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_normalize_crate_names() {
        let config = LoggerConfig::new(["predictor-server", "predictor_core"]).verbose(true);
        assert_eq!(
            config.default_directives(),
            "predictor_server=debug,predictor_core=debug,tower_http=info"
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(LoggerError::InvalidFormat(_))
        ));
    }
}
