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

use crate::error::{ConfigError, ConfigResult};
use crate::schema::*;

/// Validation for configuration sections.
pub trait Validator {
    /// Validate the section, returning the first problem found
    fn validate(&self) -> ConfigResult<()>;
}

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        self.archive.validate()?;
        self.ctree.validate()?;
        self.remote.validate()?;
        self.metastore.validate()?;
        self.file_types.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

impl Validator for ArchiveConfig {
    fn validate(&self) -> ConfigResult<()> {
        require_absolute("archive.ftp_mount", &self.ftp_mount)?;
        require_absolute("archive.staging_mount", &self.staging_mount)?;

        if self.root_segment.is_empty() {
            return Err(ConfigError::missing("archive.root_segment"));
        }
        if self.root_segment.contains('/') {
            return Err(ConfigError::invalid_value(
                "archive.root_segment",
                format!("must be a single path component, got '{}'", self.root_segment),
            ));
        }

        if self.ftp_mount.trim_end_matches('/') == self.staging_mount.trim_end_matches('/') {
            return Err(ConfigError::invalid_value(
                "archive.staging_mount",
                "staging mount must differ from the published mount",
            ));
        }

        Ok(())
    }
}

impl Validator for CtreeConfig {
    fn validate(&self) -> ConfigResult<()> {
        require_relative("ctree.tree_remote_path", &self.tree_remote_path)?;
        require_relative("ctree.changelog_remote_path", &self.changelog_remote_path)?;
        require_relative("ctree.details_dir", &self.details_dir)?;

        if self.tree_remote_path == self.changelog_remote_path {
            return Err(ConfigError::invalid_value(
                "ctree.changelog_remote_path",
                "tree listing and change-log must be published under different paths",
            ));
        }

        if self.scratch_dir.as_os_str().is_empty() {
            return Err(ConfigError::missing("ctree.scratch_dir"));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(ConfigError::missing("ctree.backup_dir"));
        }

        Ok(())
    }
}

impl Validator for RemoteConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::missing("remote.endpoint"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::invalid_value(
                "remote.endpoint",
                format!("must be an http(s) URL, got '{}'", self.endpoint),
            ));
        }
        if self.version.is_empty() {
            return Err(ConfigError::missing("remote.version"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "remote.timeout_secs",
                "timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validator for MetastoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::missing("metastore.path"));
        }
        Ok(())
    }
}

impl Validator for FileTypeConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (ext, tag) in &self.rules {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::invalid_value(
                    "file_types.rules",
                    format!("extension keys are written without a leading dot, got '{}'", ext),
                ));
            }
            if tag.is_empty() {
                return Err(ConfigError::invalid_value(
                    "file_types.rules",
                    format!("empty type tag for extension '{}'", ext),
                ));
            }
        }
        Ok(())
    }
}

impl Validator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        require_one_of(
            "observability.log_level",
            &self.log_level,
            &["trace", "debug", "info", "warn", "error"],
        )?;
        require_one_of(
            "observability.log_format",
            &self.log_format,
            &["pretty", "compact", "json"],
        )
    }
}

fn require_one_of(field: &str, value: &str, allowed: &[&str]) -> ConfigResult<()> {
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
        return Ok(());
    }
    Err(ConfigError::invalid_value(
        field,
        format!("'{}' is not one of {}", value, allowed.join(", ")),
    ))
}

fn require_absolute(field: &str, value: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::missing(field));
    }
    if !value.starts_with('/') {
        return Err(ConfigError::invalid_value(
            field,
            format!("must be an absolute path, got '{}'", value),
        ));
    }
    Ok(())
}

fn require_relative(field: &str, value: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::missing(field));
    }
    if value.starts_with('/') {
        return Err(ConfigError::invalid_value(
            field,
            format!("remote paths are relative to the archive root, got '{}'", value),
        ));
    }
    Ok(())
}
