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

use super::open_archive;
use crate::output;
use anyhow::{bail, Context, Result};
use clap::Parser;
use ctree_archive::ArchiveStore;
use ctree_config::Config;
use std::path::PathBuf;

/// Show an archived object, optionally downloading it
///
/// Without --path the published tree listing is looked up, which is the
/// usual way to get the --prod-tree input of `ctree run`.
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:
    # Metadata of the published tree
    ctree fetch

    # Download the published change-log
    ctree fetch --path ftp/CHANGELOG --output CHANGELOG")]
pub struct FetchCmd {
    /// Remote path (defaults to the published tree listing)
    #[arg(long, value_name = "REMOTE_PATH")]
    pub path: Option<String>,

    /// Download the object to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the metadata as JSON
    #[arg(long)]
    pub json: bool,
}

impl FetchCmd {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let archive = open_archive(config)?;
        let path = self
            .path
            .as_deref()
            .unwrap_or(&config.ctree.tree_remote_path);

        let Some(object) = archive
            .fetch_metadata(path)
            .await
            .with_context(|| format!("cannot look up {}", path))?
        else {
            bail!("no archived object at {}", path);
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&object)?);
        } else {
            output::header(path);
            output::detail("Object id", &object.fire_oid);
            output::detail("MD5", &object.md5);
            output::detail("Size", &object.size.to_string());
            output::detail("Created", &object.created);
            output::detail("Published", if object.published { "yes" } else { "no" });
        }

        if let Some(dest) = &self.output {
            match archive
                .download(path, dest)
                .await
                .with_context(|| format!("cannot download {}", path))?
            {
                Some(written) => {
                    output::success(&format!("Downloaded to {}", written.display()))
                }
                None => bail!("{} disappeared before it could be downloaded", path),
            }
        }
        Ok(())
    }
}
