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

//! Metadata snapshot extraction
//!
//! Dumps the current rows of the metadata store as a tree listing and, in the
//! same pass, builds the snapshot the diff engine compares against the
//! published listing.
//!
//! Rows are filtered before they reach the listing:
//!
//! 1. the `ftp_mount` prefix is stripped from the row name;
//! 2. rows still under the staging mount are in flight and skipped;
//! 3. rows whose first path component is not the published root are skipped;
//! 4. the reconciler's own artifacts (tree listing, change-log, detail files)
//!    are skipped, since publishing them changes their hashes on every run.

use crate::error::{ReconcileError, ReconcileResult};
use crate::snapshot::{Snapshot, FILE_KIND};
use ctree_config::{ArchiveConfig, CtreeConfig};
use ctree_metastore::{FileRecord, MetadataStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, trace};

/// Column of a dumped tree listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeField {
    /// Archive-relative path
    Name,
    /// Entry kind, always `file` for extracted rows
    Type,
    /// Size in bytes
    Size,
    /// Last update time, falling back to creation time
    Updated,
    /// Content hash
    Md5,
}

impl TreeField {
    /// Column order of the canonical listing
    pub const CANONICAL: [TreeField; 5] = [
        TreeField::Name,
        TreeField::Type,
        TreeField::Size,
        TreeField::Updated,
        TreeField::Md5,
    ];

    fn render(&self, record: &FileRecord, relative: &str) -> String {
        match self {
            TreeField::Name => relative.to_string(),
            TreeField::Type => FILE_KIND.to_string(),
            TreeField::Size => record.size.to_string(),
            TreeField::Updated => record.updated.as_deref().unwrap_or(&record.created).to_string(),
            TreeField::Md5 => record.md5.clone(),
        }
    }
}

impl fmt::Display for TreeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TreeField::Name => "name",
            TreeField::Type => "type",
            TreeField::Size => "size",
            TreeField::Updated => "updated",
            TreeField::Md5 => "md5",
        };
        f.write_str(name)
    }
}

impl FromStr for TreeField {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(TreeField::Name),
            "type" => Ok(TreeField::Type),
            "size" => Ok(TreeField::Size),
            "updated" => Ok(TreeField::Updated),
            "md5" => Ok(TreeField::Md5),
            other => Err(ReconcileError::invariant(format!(
                "unknown tree column '{}'",
                other
            ))),
        }
    }
}

/// Builds the new snapshot from the metadata store.
#[derive(Debug)]
pub struct SnapshotExtractor<'a> {
    store: &'a dyn MetadataStore,
    archive: &'a ArchiveConfig,
    excluded: Vec<String>,
    excluded_dirs: Vec<String>,
}

impl<'a> SnapshotExtractor<'a> {
    /// Extractor over `store` for the archive laid out as `archive`
    pub fn new(store: &'a dyn MetadataStore, archive: &'a ArchiveConfig) -> Self {
        SnapshotExtractor {
            store,
            archive,
            excluded: Vec::new(),
            excluded_dirs: Vec::new(),
        }
    }

    /// Extractor that leaves out the artifacts a run publishes itself
    pub fn for_run(
        store: &'a dyn MetadataStore,
        archive: &'a ArchiveConfig,
        ctree: &CtreeConfig,
    ) -> Self {
        Self::new(store, archive)
            .excluding(&ctree.tree_remote_path)
            .excluding(&ctree.changelog_remote_path)
            .excluding_dir(&ctree.details_dir)
    }

    /// Leave `path` (archive-relative) out of the snapshot
    pub fn excluding(mut self, path: &str) -> Self {
        self.excluded.push(path.trim_matches('/').to_string());
        self
    }

    /// Leave everything under `dir` (archive-relative) out of the snapshot
    pub fn excluding_dir(mut self, dir: &str) -> Self {
        self.excluded_dirs
            .push(format!("{}/", dir.trim_matches('/')));
        self
    }

    /// Archive-relative path for `record`, or `None` when it does not belong
    /// in the published snapshot.
    fn published_path<'r>(&self, record: &'r FileRecord) -> Option<&'r str> {
        let relative = self.archive.relativize(&record.name);
        if relative.contains(self.archive.staging_mount.as_str()) {
            trace!(name = %record.name, "Skipping staged row");
            return None;
        }
        if relative.split('/').next() != Some(self.archive.root_segment.as_str()) {
            trace!(name = %record.name, "Skipping row outside the published root");
            return None;
        }
        if self.excluded.iter().any(|p| p == relative)
            || self.excluded_dirs.iter().any(|d| relative.starts_with(d.as_str()))
        {
            trace!(name = %record.name, "Skipping reconciler artifact");
            return None;
        }
        Some(relative)
    }

    /// Dump up to `limit` rows to `output` as a listing with the columns
    /// `fields`, and return the output path with the extracted snapshot.
    ///
    /// The listing is written to a temporary sibling and renamed into place,
    /// so a failed extraction never leaves a truncated file behind.
    pub async fn extract(
        &self,
        fields: &[TreeField],
        output: impl AsRef<Path>,
        limit: Option<usize>,
    ) -> ReconcileResult<(PathBuf, Snapshot)> {
        let output = output.as_ref();
        if fields.is_empty() {
            return Err(ReconcileError::invariant("no columns requested for the tree listing"));
        }

        let rows = self
            .store
            .list_rows(limit)
            .await
            .map_err(|e| ReconcileError::metastore("extract snapshot", output.display().to_string(), e))?;

        let mut listing = String::new();
        let mut snapshot = Snapshot::new();
        for record in &rows {
            let Some(relative) = self.published_path(record) else {
                continue;
            };
            let line: Vec<String> = fields.iter().map(|f| f.render(record, relative)).collect();
            listing.push_str(&line.join("\t"));
            listing.push('\n');
            snapshot.insert(relative, record.md5.as_str());
        }

        crate::write_atomic(output, listing.as_bytes()).await?;
        info!(
            output = %output.display(),
            rows = rows.len(),
            entries = snapshot.len(),
            "Extracted metadata snapshot"
        );
        debug!(skipped = rows.len() - snapshot.len(), "Rows left out of the snapshot");
        Ok((output.to_path_buf(), snapshot))
    }
}
