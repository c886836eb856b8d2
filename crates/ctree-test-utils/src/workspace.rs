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

//! Scratch directory laid out for one reconciliation run

use crate::fixtures::{FTP_MOUNT, STAGING_MOUNT};
use ctree_config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory with a config pointing into it.
///
/// ```ignore
/// use ctree_test_utils::TestWorkspace;
///
/// let ws = TestWorkspace::new();
/// ws.write_prod_tree(&[("ftp/a.cram", "h1")]);
/// ws.write_changelog("2021-01-01\n\n");
/// let config_path = ws.write_config();
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
    config: Config,
}

impl TestWorkspace {
    /// Fresh workspace with the default test config
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();

        let mut config = Config::default();
        config.archive.ftp_mount = FTP_MOUNT.to_string();
        config.archive.staging_mount = STAGING_MOUNT.to_string();
        config.ctree.scratch_dir = root.join("scratch");
        config.ctree.backup_dir = root.join("backup");
        config.metastore.path = root.join("ctree.sqlite");
        config.file_types.rules = [
            ("cram", "CRAM"),
            ("crai", "CRAI"),
            ("bam", "BAM"),
            ("gz", "VCF"),
            ("txt", "TXT"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        TestWorkspace { temp_dir, config }
    }

    /// Root of the workspace
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Config for this workspace
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the config before it is written
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Write the config as TOML and return its path
    pub fn write_config(&self) -> PathBuf {
        let path = self.path().join("ctree.toml");
        let content = toml::to_string(&self.config).expect("Failed to encode config");
        fs::write(&path, content).expect("Failed to write config");
        path
    }

    /// Where the staging tree is extracted
    pub fn staging_tree(&self) -> PathBuf {
        self.path().join("staging.tree")
    }

    /// Local copy of the published tree
    pub fn prod_tree(&self) -> PathBuf {
        self.path().join("current.tree")
    }

    /// Working copy of the change-log
    pub fn changelog(&self) -> PathBuf {
        self.path().join("CHANGELOG")
    }

    /// Write the published tree listing and return its content
    pub fn write_prod_tree(&self, entries: &[(&str, &str)]) -> String {
        let content = crate::fixtures::canonical_tree(entries);
        fs::write(self.prod_tree(), &content).expect("Failed to write tree");
        content
    }

    /// Write the change-log working copy
    pub fn write_changelog(&self, content: &str) {
        fs::write(self.changelog(), content).expect("Failed to write change-log");
    }

    /// Read a file relative to the workspace
    pub fn read_text_file(&self, name: impl AsRef<Path>) -> String {
        fs::read_to_string(self.path().join(name)).expect("Failed to read text file")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
