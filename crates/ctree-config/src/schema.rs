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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Root configuration record.
///
/// Built once at process start by [`ConfigLoader`](crate::ConfigLoader) and
/// handed by value to every component that needs it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// Mount points of the published and staging trees
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Tree listing, change-log and scratch locations
    #[serde(default)]
    pub ctree: CtreeConfig,

    /// Remote object store connection
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Metadata store connection
    #[serde(default)]
    pub metastore: MetastoreConfig,

    /// Extension to file-type rules used in change-log entries
    #[serde(default)]
    pub file_types: FileTypeConfig,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Filesystem layout of the published archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchiveConfig {
    /// Absolute prefix under which the published tree is mounted
    #[serde(default = "default_ftp_mount")]
    pub ftp_mount: String,

    /// Absolute prefix of the staging area; rows under it are still in flight
    #[serde(default = "default_staging_mount")]
    pub staging_mount: String,

    /// First path component of every published path (e.g. `ftp`)
    #[serde(default = "default_root_segment")]
    pub root_segment: String,
}

impl ArchiveConfig {
    /// Turn an absolute metadata-store path into an archive-relative one.
    ///
    /// Returns the input unchanged when it is not under `ftp_mount`.
    pub fn relativize<'a>(&self, path: &'a str) -> &'a str {
        let mount = self.ftp_mount.trim_end_matches('/');
        match path.strip_prefix(mount) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => path,
        }
    }

    /// Absolute metadata-store path for an archive-relative path
    pub fn absolutize(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.ftp_mount.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

/// How hash-matching paths are paired into moves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MoveDetection {
    /// Pair every hash candidate positionally, in lexicographic path order
    #[default]
    Positional,

    /// Only record a move when a hash has a single unmatched path on each side
    Unique,
}

/// Locations used by the reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CtreeConfig {
    /// Remote path of the published tree listing
    #[serde(default = "default_tree_remote_path")]
    pub tree_remote_path: String,

    /// Remote path of the published change-log
    #[serde(default = "default_changelog_remote_path")]
    pub changelog_remote_path: String,

    /// Remote directory that receives the per-run detail files
    #[serde(default = "default_details_dir")]
    pub details_dir: String,

    /// Local directory for detail files and the run checkpoint
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Local directory for `.backup` copies of replaced remote objects
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Keep `.backup` copies once a run completes
    #[serde(default = "default_true")]
    pub keep_backups: bool,

    /// Move pairing policy
    #[serde(default)]
    pub move_detection: MoveDetection,
}

/// REST endpoint of the remote object store.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    /// Root endpoint, e.g. `https://host/fire`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API version segment appended to the endpoint
    #[serde(default = "default_api_version")]
    pub version: String,

    /// Basic-auth user
    #[serde(default)]
    pub user: String,

    /// Basic-auth password, usually supplied through `CTREE_REMOTE_PASSWORD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("version", &self.version)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl RemoteConfig {
    /// Base URL of the objects API
    pub fn objects_url(&self) -> String {
        format!(
            "{}/{}/objects",
            self.endpoint.trim_end_matches('/'),
            self.version.trim_matches('/')
        )
    }
}

/// Metadata store location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetastoreConfig {
    /// SQLite database file
    #[serde(default = "default_metastore_path")]
    pub path: PathBuf,
}

/// File-type tagging rules keyed by file extension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FileTypeConfig {
    /// Extension (without the dot) to type tag
    #[serde(default)]
    pub rules: BTreeMap<String, String>,

    /// Tag used when no rule matches; unmatched files are an error without it
    #[serde(default)]
    pub fallback: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_true() -> bool {
    true
}

fn default_ftp_mount() -> String {
    "/nfs/1000g-archive/vol1".to_string()
}

fn default_staging_mount() -> String {
    "/nfs/1000g-work/G1K/archive_staging".to_string()
}

fn default_root_segment() -> String {
    "ftp".to_string()
}

fn default_tree_remote_path() -> String {
    "ftp/current.tree".to_string()
}

fn default_changelog_remote_path() -> String {
    "ftp/CHANGELOG".to_string()
}

fn default_details_dir() -> String {
    "ftp/changelog_details".to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./ctree-work")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("./ctree-work/backup")
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/fire".to_string()
}

fn default_api_version() -> String {
    "v1.1".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_metastore_path() -> PathBuf {
    PathBuf::from("./ctree.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            ftp_mount: default_ftp_mount(),
            staging_mount: default_staging_mount(),
            root_segment: default_root_segment(),
        }
    }
}

impl Default for CtreeConfig {
    fn default() -> Self {
        CtreeConfig {
            tree_remote_path: default_tree_remote_path(),
            changelog_remote_path: default_changelog_remote_path(),
            details_dir: default_details_dir(),
            scratch_dir: default_scratch_dir(),
            backup_dir: default_backup_dir(),
            keep_backups: true,
            move_detection: MoveDetection::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            endpoint: default_endpoint(),
            version: default_api_version(),
            user: String::new(),
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MetastoreConfig {
    fn default() -> Self {
        MetastoreConfig {
            path: default_metastore_path(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}
