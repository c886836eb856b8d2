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

use super::{default_staging_tree, open_archive, open_store, print_counts, tree_format};
use crate::output;
use anyhow::{Context, Result};
use clap::Parser;
use ctree_config::Config;
use ctree_core::{ChangeKind, ChangeSet, SyncWorkflow};
use std::path::PathBuf;

/// Show what a run would publish
///
/// Extracts the staging tree from the metadata store and classifies it
/// against the published tree. Nothing is uploaded and no metadata row is
/// touched; only the staging tree file is written.
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:
    # Counts per bucket
    ctree diff --prod-tree current.tree

    # Every changed path
    ctree diff --prod-tree current.tree --list

    # Machine-readable
    ctree diff --prod-tree current.tree --json")]
pub struct DiffCmd {
    /// Where to write the extracted listing
    /// (defaults to staging.tree in the scratch directory)
    #[arg(long, value_name = "PATH")]
    pub staging_tree: Option<PathBuf>,

    /// Local copy of the published tree listing
    #[arg(long, value_name = "PATH")]
    pub prod_tree: PathBuf,

    /// The published tree starts with a header line naming its columns
    #[arg(long)]
    pub legacy_header: bool,

    /// Extract at most N metadata rows
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// List every changed path
    #[arg(long)]
    pub list: bool,

    /// Print the change set as JSON
    #[arg(long)]
    pub json: bool,
}

impl DiffCmd {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let store = open_store(config)?;
        let archive = open_archive(config)?;
        let staging_tree = self
            .staging_tree
            .clone()
            .unwrap_or_else(|| default_staging_tree(config));

        let workflow = SyncWorkflow::new(config, &store, &archive);
        let changes = workflow
            .diff(
                &staging_tree,
                &self.prod_tree,
                tree_format(self.legacy_header),
                self.limit,
            )
            .await
            .context("cannot classify changes")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&changes)?);
            return Ok(());
        }

        if changes.is_empty() {
            output::success("No changes");
            return Ok(());
        }

        output::header(&format!("{} change(s)", changes.size()));
        print_counts(&changes.counts());
        if self.list {
            print_paths(&changes);
        }
        Ok(())
    }
}

fn print_paths(changes: &ChangeSet) {
    for kind in changes.kinds() {
        println!();
        println!("  {}:", kind);
        match kind {
            ChangeKind::New => changes.new.iter().for_each(|path| output::change('+', path)),
            ChangeKind::Withdrawn => changes
                .withdrawn
                .iter()
                .for_each(|path| output::change('-', path)),
            ChangeKind::Moved => changes
                .moved
                .iter()
                .for_each(|(old, new)| output::change('>', &format!("{} -> {}", old, new))),
            ChangeKind::Replaced => changes
                .replaced
                .keys()
                .for_each(|path| output::change('~', path)),
        }
    }
}
