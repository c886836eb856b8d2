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
use crate::schema::{Config, MoveDetection};
use crate::validation::Validator;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::NoExtension(path.to_path_buf())),
        }
    }

    /// Get format name as string
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Configuration loader
///
/// Environment overrides are applied after the file is parsed and before
/// validation, so a value supplied only through the environment (the remote
/// password, typically) still passes through the same checks.
pub struct ConfigLoader {
    validate: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        ConfigLoader { validate: true }
    }

    /// Create a loader without validation
    pub fn without_validation() -> Self {
        ConfigLoader { validate: false }
    }

    /// Load configuration from a file
    pub async fn load_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let config = self.read_file(path.as_ref()).await?;
        self.finish(config)
    }

    /// Load configuration from a string
    pub fn load_from_string(&self, content: &str, format: ConfigFormat) -> ConfigResult<Config> {
        let config = parse(content, format)?;
        debug!("Configuration loaded from {}", format.name());
        self.finish(config)
    }

    /// Load configuration with `CTREE_*` environment variable overrides
    pub async fn load_with_overrides<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let mut config = self.read_file(path.as_ref()).await?;
        self.apply_env_overrides(&mut config)?;
        self.finish(config)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn load_from_env(&self) -> ConfigResult<Config> {
        let mut config = Config::default();
        self.apply_env_overrides(&mut config)?;
        self.finish(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&self, config: &mut Config) -> ConfigResult<()> {
        apply_overrides(config, |name| std::env::var(name).ok())
    }

    async fn read_file(&self, path: &Path) -> ConfigResult<Config> {
        let format = ConfigFormat::from_path(path)?;
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()))
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        info!(path = %path.display(), format = format.name(), "Read configuration file");
        parse(&content, format)
    }

    fn finish(&self, config: Config) -> ConfigResult<Config> {
        if self.validate {
            config.validate()?;
            info!("Configuration validated successfully");
        }
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse(content: &str, format: ConfigFormat) -> ConfigResult<Config> {
    let name = format.name();
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::parse(name, e)),
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| ConfigError::parse(name, e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::parse(name, e)),
    }
}

/// Apply `CTREE_*` overrides using `lookup` to resolve variable names.
///
/// Split from [`ConfigLoader::apply_env_overrides`] so tests can supply a map
/// instead of mutating the process environment.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    // Archive layout
    if let Some(value) = lookup("CTREE_ARCHIVE_FTP_MOUNT") {
        config.archive.ftp_mount = value;
    }
    if let Some(value) = lookup("CTREE_ARCHIVE_STAGING_MOUNT") {
        config.archive.staging_mount = value;
    }
    if let Some(value) = lookup("CTREE_ARCHIVE_ROOT_SEGMENT") {
        config.archive.root_segment = value;
    }

    // Run locations
    if let Some(value) = lookup("CTREE_SCRATCH_DIR") {
        config.ctree.scratch_dir = PathBuf::from(value);
    }
    if let Some(value) = lookup("CTREE_BACKUP_DIR") {
        config.ctree.backup_dir = PathBuf::from(value);
    }
    if let Some(value) = lookup("CTREE_KEEP_BACKUPS") {
        config.ctree.keep_backups = parse_bool("CTREE_KEEP_BACKUPS", &value)?;
    }
    if let Some(value) = lookup("CTREE_MOVE_DETECTION") {
        config.ctree.move_detection = match value.to_lowercase().as_str() {
            "positional" => MoveDetection::Positional,
            "unique" => MoveDetection::Unique,
            _ => {
                return Err(ConfigError::env_override(
                    "CTREE_MOVE_DETECTION",
                    &value,
                    "expected 'positional' or 'unique'",
                ))
            }
        };
    }

    // Remote store
    if let Some(value) = lookup("CTREE_REMOTE_ENDPOINT") {
        config.remote.endpoint = value;
    }
    if let Some(value) = lookup("CTREE_REMOTE_USER") {
        config.remote.user = value;
    }
    if let Some(value) = lookup("CTREE_REMOTE_PASSWORD") {
        config.remote.password = Some(value);
    }
    if let Some(value) = lookup("CTREE_REMOTE_TIMEOUT_SECS") {
        config.remote.timeout_secs = value.parse().map_err(|_| {
            ConfigError::env_override(
                "CTREE_REMOTE_TIMEOUT_SECS",
                &value,
                "expected a whole number of seconds",
            )
        })?;
    }

    // Metadata store
    if let Some(value) = lookup("CTREE_METASTORE_PATH") {
        config.metastore.path = PathBuf::from(value);
    }

    // Observability
    if let Some(value) = lookup("CTREE_LOG_LEVEL") {
        config.observability.log_level = value;
    }
    if let Some(value) = lookup("CTREE_LOG_FORMAT") {
        config.observability.log_format = value;
    }

    Ok(())
}

/// Parse boolean from string (accepts: true, false, yes, no, 1, 0, on, off)
fn parse_bool(variable: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::env_override(
            variable,
            value,
            "expected 'true', 'false', 'yes', 'no', '1', '0', 'on', or 'off'",
        )),
    }
}
