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

pub mod checkpoint;
pub mod diff;
pub mod dump;
pub mod fetch;
pub mod run;

pub use checkpoint::CheckpointCmd;
pub use diff::DiffCmd;
pub use dump::DumpCmd;
pub use fetch::FetchCmd;
pub use run::RunCmd;

use crate::output;
use anyhow::{Context, Result};
use ctree_archive::FireClient;
use ctree_config::{Config, ConfigLoader};
use ctree_core::{ChangeCounts, TreeFormat};
use ctree_metastore::SqliteStore;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "ctree.toml";

/// Load the run configuration.
///
/// An explicit path must exist. Without one, `ctree.toml` in the working
/// directory is used if present, else defaults plus `CTREE_*` variables.
pub async fn load_config(path: Option<&Path>) -> Result<Config> {
    let loader = ConfigLoader::new();
    let config = match path {
        Some(path) => loader
            .load_with_overrides(path)
            .await
            .with_context(|| format!("cannot load configuration {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => loader
            .load_with_overrides(DEFAULT_CONFIG_FILE)
            .await
            .with_context(|| format!("cannot load configuration {}", DEFAULT_CONFIG_FILE))?,
        None => loader
            .load_from_env()
            .context("cannot build configuration from the environment")?,
    };
    Ok(config)
}

pub(crate) fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.metastore.path).with_context(|| {
        format!(
            "cannot open metadata store {}",
            config.metastore.path.display()
        )
    })
}

pub(crate) fn open_archive(config: &Config) -> Result<FireClient> {
    FireClient::new(&config.remote)
        .with_context(|| format!("cannot set up client for {}", config.remote.endpoint))
}

pub(crate) fn tree_format(legacy_header: bool) -> TreeFormat {
    if legacy_header {
        TreeFormat::LegacyHeader
    } else {
        TreeFormat::Canonical
    }
}

/// Default location of the extracted listing
pub(crate) fn default_staging_tree(config: &Config) -> PathBuf {
    config.ctree.scratch_dir.join("staging.tree")
}

pub(crate) fn print_counts(counts: &ChangeCounts) {
    output::detail("New", &counts.new.to_string());
    output::detail("Withdrawn", &counts.withdrawn.to_string());
    output::detail("Moved", &counts.moved.to_string());
    output::detail("Replaced", &counts.replaced.to_string());
}
