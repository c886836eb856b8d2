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

use super::open_store;
use crate::output;
use anyhow::{Context, Result};
use clap::Parser;
use ctree_config::Config;
use ctree_core::{SnapshotExtractor, TreeField};
use std::path::PathBuf;

/// Dump the metadata store as a tree listing
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:
    # Canonical five-column listing
    ctree dump --output staging.tree

    # Paths and checksums only
    ctree dump --output md5.list --fields name,md5")]
pub struct DumpCmd {
    /// Listing to write
    #[arg(long, value_name = "PATH")]
    pub output: PathBuf,

    /// Columns to write, in order
    #[arg(
        long,
        value_name = "COLUMNS",
        value_delimiter = ',',
        default_value = "name,type,size,updated,md5"
    )]
    pub fields: Vec<TreeField>,

    /// Dump at most N rows
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

impl DumpCmd {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let store = open_store(config)?;
        let extractor = SnapshotExtractor::for_run(&store, &config.archive, &config.ctree);
        let (path, snapshot) = extractor
            .extract(&self.fields, &self.output, self.limit)
            .await
            .context("cannot dump metadata store")?;

        output::success(&format!(
            "Wrote {} entries to {}",
            snapshot.len(),
            path.display()
        ));
        Ok(())
    }
}
