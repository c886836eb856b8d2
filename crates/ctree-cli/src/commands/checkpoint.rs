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

use super::print_counts;
use crate::output;
use anyhow::{Context, Result};
use clap::Subcommand;
use ctree_config::Config;
use ctree_core::RunCheckpoint;

/// Inspect or drop the checkpoint of an interrupted run
#[derive(Subcommand, Debug)]
pub enum CheckpointCmd {
    /// Show the checkpoint left by an interrupted run
    Show {
        /// Print the checkpoint as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the checkpoint so the next run starts from scratch
    Discard,
}

impl CheckpointCmd {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let scratch_dir = &config.ctree.scratch_dir;
        match self {
            CheckpointCmd::Show { json } => {
                let checkpoint = RunCheckpoint::load(scratch_dir)
                    .await
                    .context("cannot read checkpoint")?;
                let Some(checkpoint) = checkpoint else {
                    output::info("No unfinished run");
                    return Ok(());
                };

                if *json {
                    println!("{}", serde_json::to_string_pretty(&checkpoint)?);
                    return Ok(());
                }

                output::header("Unfinished run");
                output::detail("Run id", &checkpoint.run_id);
                output::detail("State", &checkpoint.state.to_string());
                output::detail("Started", &checkpoint.started_at.to_rfc3339());
                output::detail("Staging tree", &checkpoint.staging_tree.display().to_string());
                output::detail("Published tree", &checkpoint.prod_tree.display().to_string());
                output::detail("Change-log", &checkpoint.changelog.display().to_string());
                if let Some(changes) = &checkpoint.changeset {
                    print_counts(&changes.counts());
                }
                output::detail("Pushed", &checkpoint.pushed.len().to_string());
                for backup in &checkpoint.backups {
                    output::detail("Backup", &backup.display().to_string());
                }
                output::info("Continue with `ctree run --resume` or drop it with `ctree checkpoint discard`");
            }
            CheckpointCmd::Discard => {
                if RunCheckpoint::remove(scratch_dir)
                    .await
                    .context("cannot remove checkpoint")?
                {
                    output::success("Checkpoint discarded");
                } else {
                    output::info("No unfinished run");
                }
            }
        }
        Ok(())
    }
}
