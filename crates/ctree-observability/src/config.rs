// ctree - current tree reconciliation for data archives
// Copyright (C) 2026 ctree Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Logging configuration.
//!
//! [`LogConfig`] is assembled from the `[observability]` section of the run
//! configuration and the CLI verbosity flags, then handed to
//! [`init_tracing_with_config`](crate::init_tracing_with_config).

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during logging set-up
#[derive(Error, Debug)]
pub enum LogError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("unknown log format '{0}' (expected pretty, compact or json)")]
    InvalidFormat(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Result alias for logging set-up
pub type LogResult<T> = Result<T, LogError>;

/// Output format for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human-readable output
    #[default]
    Pretty,

    /// Single-line output, suited to cron mail
    Compact,

    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("pretty") {
            Ok(LogFormat::Pretty)
        } else if s.eq_ignore_ascii_case("compact") {
            Ok(LogFormat::Compact)
        } else if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else {
            Err(LogError::InvalidFormat(s.to_string()))
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// Standard error, leaving stdout to command results
    #[default]
    Stderr,

    /// Standard output
    Stdout,
}

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Line format
    pub format: LogFormat,

    /// Filter directive (e.g. `info`, `ctree_core=debug`).
    /// `None` falls back to `RUST_LOG`, then `info`.
    pub level: Option<String>,

    /// ANSI colours (ignored for JSON)
    pub use_color: bool,

    /// Prefix lines with a timestamp
    pub use_timestamps: bool,

    /// Show the emitting module
    pub include_targets: bool,

    /// Output stream
    pub output: LogOutput,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::default(),
            level: None,
            use_color: true,
            use_timestamps: true,
            include_targets: true,
            output: LogOutput::default(),
        }
    }
}

impl LogConfig {
    /// Default settings: pretty, coloured, to stderr
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings from the `[observability]` values `log_level` and `log_format`
    pub fn from_settings(log_level: &str, log_format: &str) -> LogResult<Self> {
        Ok(LogConfig::new()
            .with_format(log_format.parse()?)
            .with_level(log_level))
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    pub fn with_timestamps(mut self, use_timestamps: bool) -> Self {
        self.use_timestamps = use_timestamps;
        self
    }

    pub fn with_targets(mut self, include_targets: bool) -> Self {
        self.include_targets = include_targets;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Filter directive actually applied: configured, else `RUST_LOG`, else `info`
    pub fn effective_level(&self) -> String {
        match &self.level {
            Some(level) => level.clone(),
            None => std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

/// Level implied by `-v`/`-q` flags, or `None` to keep the configured one.
///
/// Quiet wins over verbose. One `-v` is `debug`, two or more is `trace`.
pub fn verbosity_level(verbose: u8, quiet: bool) -> Option<&'static str> {
    match (quiet, verbose) {
        (true, _) => Some("error"),
        (false, 0) => None,
        (false, 1) => Some("debug"),
        (false, _) => Some("trace"),
    }
}
