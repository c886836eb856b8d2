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
use ctree_core::{RunRequest, SyncOutcome, SyncSummary, SyncWorkflow};
use std::path::PathBuf;

/// Reconcile the published tree with the metadata store
///
/// Extracts the staging tree, classifies it against the published tree,
/// uploads detail files, prepends a change-log entry and republishes the
/// change-log and the tree. Progress is checkpointed under the scratch
/// directory; an interrupted run is continued with --resume.
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:
    # Preview what would be published
    ctree run --prod-tree current.tree --changelog CHANGELOG --dry-run

    # Publish
    ctree run --prod-tree current.tree --changelog CHANGELOG

    # Continue an interrupted run
    ctree run --prod-tree current.tree --changelog CHANGELOG --resume")]
pub struct RunCmd {
    /// Where to write the listing extracted from the metadata store
    /// (defaults to staging.tree in the scratch directory)
    #[arg(long, value_name = "PATH")]
    pub staging_tree: Option<PathBuf>,

    /// Local copy of the published tree listing
    #[arg(long, value_name = "PATH")]
    pub prod_tree: PathBuf,

    /// Local working copy of the change-log
    #[arg(long, value_name = "PATH")]
    pub changelog: PathBuf,

    /// Log every mutating step instead of performing it
    #[arg(long)]
    pub dry_run: bool,

    /// Continue from the checkpoint of an interrupted run
    #[arg(long)]
    pub resume: bool,

    /// Extract at most N metadata rows
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// The published tree starts with a header line naming its columns
    #[arg(long)]
    pub legacy_header: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCmd {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        if self.dry_run && self.resume {
            output::warning("--resume has no effect on a dry run; previewing a fresh run");
        }

        let store = open_store(config)?;
        let archive = open_archive(config)?;

        let staging_tree = self
            .staging_tree
            .clone()
            .unwrap_or_else(|| default_staging_tree(config));
        let request = RunRequest::new(staging_tree, self.prod_tree.clone(), self.changelog.clone())
            .prod_format(tree_format(self.legacy_header))
            .limit(self.limit)
            .dry_run(self.dry_run)
            .resume(self.resume);

        let workflow = SyncWorkflow::new(config, &store, &archive);
        let outcome = workflow
            .run(&request)
            .await
            .context("reconciliation failed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        match outcome {
            SyncOutcome::NoChanges => {
                output::success("Published tree is up to date; nothing to do");
            }
            SyncOutcome::Published(summary) => print_summary(&summary),
        }
        Ok(())
    }
}

fn print_summary(summary: &SyncSummary) {
    if summary.dry_run {
        output::header("Dry run: nothing was changed");
    } else {
        output::header("Published");
    }
    output::detail("Run id", &summary.run_id);
    print_counts(&summary.changes);
    output::detail("Detail files", &summary.detail_files.len().to_string());
    output::detail("Change-log", &summary.changelog_path);
    output::detail("Tree", &summary.tree_path);

    let verb = if summary.dry_run { "Would push" } else { "Pushed" };
    output::info(&format!("{} {} object(s)", verb, summary.pushed.len()));
    for path in &summary.pushed {
        output::change('>', path);
    }
    for backup in &summary.backups {
        output::detail("Backup", &backup.display().to_string());
    }

    if summary.dry_run {
        output::info("Run again without --dry-run to publish");
    } else {
        output::success(&format!("Reconciled: {}", summary.changes));
    }
}
