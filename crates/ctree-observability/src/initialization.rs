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

//! Subscriber installation.

use crate::config::{LogConfig, LogError, LogFormat, LogOutput, LogResult};
use std::io;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Initialize tracing with the specified format and optional log level.
///
/// ```ignore
/// use ctree_observability::{init_tracing, LogFormat};
///
/// init_tracing(LogFormat::Compact, Some("debug"))?;
/// tracing::info!("reconciliation started");
/// ```
pub fn init_tracing(format: LogFormat, level: Option<&str>) -> LogResult<()> {
    let mut config = LogConfig::new().with_format(format);
    if let Some(level) = level {
        config = config.with_level(level);
    }
    init_tracing_with_config(config)
}

/// Install the global subscriber described by `config`.
///
/// Fails with [`LogError::AlreadyInitialized`] when called twice in one
/// process.
pub fn init_tracing_with_config(config: LogConfig) -> LogResult<()> {
    let env_filter = build_env_filter(&config)?;

    Registry::default()
        .with(build_fmt_layer(&config))
        .with(env_filter)
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn build_fmt_layer(config: &LogConfig) -> BoxedLayer {
    let base = fmt::layer()
        .with_writer(make_writer(config.output))
        .with_target(config.include_targets);

    match (config.format, config.use_timestamps) {
        (LogFormat::Pretty, true) => base.pretty().with_ansi(config.use_color).boxed(),
        (LogFormat::Pretty, false) => base
            .pretty()
            .without_time()
            .with_ansi(config.use_color)
            .boxed(),
        (LogFormat::Compact, true) => base.compact().with_ansi(config.use_color).boxed(),
        (LogFormat::Compact, false) => base
            .compact()
            .without_time()
            .with_ansi(config.use_color)
            .boxed(),
        (LogFormat::Json, true) => base.json().with_ansi(false).boxed(),
        (LogFormat::Json, false) => base.json().without_time().with_ansi(false).boxed(),
    }
}

fn make_writer(output: LogOutput) -> BoxMakeWriter {
    match output {
        LogOutput::Stderr => BoxMakeWriter::new(io::stderr),
        LogOutput::Stdout => BoxMakeWriter::new(io::stdout),
    }
}

/// Build an environment filter for the given configuration
pub(crate) fn build_env_filter(config: &LogConfig) -> LogResult<EnvFilter> {
    let filter = config.effective_level();
    EnvFilter::try_new(&filter).map_err(|e| LogError::InvalidFilter {
        reason: e.to_string(),
        filter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Global subscriber installation is exercised once, in tests/integration_tests.rs.

    #[test]
    fn test_env_filter_parsing() {
        assert!(build_env_filter(&LogConfig::new().with_level("debug")).is_ok());
        assert!(build_env_filter(&LogConfig::new().with_level("ctree_core=trace,warn")).is_ok());
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let result = build_env_filter(&LogConfig::new().with_level("ctree_core=loudest"));
        assert!(matches!(result, Err(LogError::InvalidFilter { .. })));
    }
}
