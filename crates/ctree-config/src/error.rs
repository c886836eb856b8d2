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

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// Every variant is fatal: a run aborts before any collaborator is contacted.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed {format} configuration: {reason}")]
    Parse { format: &'static str, reason: String },

    #[error("unsupported configuration extension '.{0}' (expected toml, yaml, yml or json)")]
    UnsupportedFormat(String),

    #[error("no configuration file at {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot tell the format of {}: no file extension", .0.display())]
    NoExtension(PathBuf),

    #[error("{variable}={value:?} is not usable: {reason}")]
    EnvOverride {
        variable: String,
        value: String,
        reason: String,
    },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("'{0}' must be set")]
    Missing(String),
}

impl ConfigError {
    pub fn env_override(
        variable: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::EnvOverride {
            variable: variable.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        ConfigError::Missing(field.into())
    }

    pub(crate) fn parse(format: &'static str, err: impl std::fmt::Display) -> Self {
        ConfigError::Parse {
            format,
            reason: err.to_string(),
        }
    }

    /// Name of the offending field or variable, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidValue { field, .. } | ConfigError::Missing(field) => Some(field),
            ConfigError::EnvOverride { variable, .. } => Some(variable),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
