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

//! Publish workflow
//!
//! One run moves through these states:
//!
//! ```text
//! Idle -> SnapshotsComputed -> Diffed -> NoOpExit
//!                                     -> DetailsPushed -> ChangelogUpdated -> TreePublished -> Done
//! ```
//!
//! - **SnapshotsComputed**: the metadata store is dumped to the staging tree
//!   and the published tree is parsed.
//! - **Diffed**: the two snapshots are classified. An empty ChangeSet deletes
//!   the staging tree and ends the run (`NoOpExit`).
//! - **DetailsPushed**: one detail file per change kind is rendered, recorded
//!   in the metadata store and uploaded under `details_dir`. A detail file
//!   already published under the same name (an earlier run that day) is
//!   backed up and replaced, and its row takes the new digest.
//! - **ChangelogUpdated**: the entry is prepended to the working change-log,
//!   whose row is updated; the published copy is backed up, deleted and
//!   replaced.
//! - **TreePublished**: the staging tree replaces the published tree the
//!   same way.
//!
//! Nothing is rolled back on failure. The `.backup` copies and the run
//! checkpoint are what an operator works from; `resume` restarts from the last
//! recorded state and skips the uploads the checkpoint lists.

use crate::changelog::{details_reference, prepend_entry};
use crate::changeset::{ChangeCounts, ChangeSet};
use crate::checkpoint::RunCheckpoint;
use crate::diff::classify;
use crate::error::{ReconcileError, ReconcileResult};
use crate::extractor::{SnapshotExtractor, TreeField};
use crate::file_type::FileTypeRules;
use crate::local_file::LocalFile;
use crate::snapshot::{Snapshot, TreeFormat};
use ctree_archive::{ArchiveStore, UploadRequest};
use ctree_config::Config;
use ctree_metastore::{FileField, FileRecord, MetadataStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Type tag of the rows recorded for detail files
pub const DETAIL_FILE_TYPE: &str = "CHANGELOG";

/// State of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    /// Nothing done yet
    Idle,
    /// Staging tree written, published tree parsed
    SnapshotsComputed,
    /// ChangeSet computed
    Diffed,
    /// Nothing to publish; terminal
    NoOpExit,
    /// Detail files recorded and uploaded
    DetailsPushed,
    /// Change-log updated and republished
    ChangelogUpdated,
    /// Tree listing republished
    TreePublished,
    /// Run finished; terminal
    Done,
}

impl WorkflowState {
    /// True for `NoOpExit` and `Done`
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::NoOpExit | WorkflowState::Done)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Inputs of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Where the listing extracted from the metadata store is written
    pub staging_tree: PathBuf,
    /// Local copy of the published listing
    pub prod_tree: PathBuf,
    /// Format of `prod_tree`
    pub prod_format: TreeFormat,
    /// Working copy of the change-log
    pub changelog: PathBuf,
    /// Row limit for the extraction
    pub limit: Option<usize>,
    /// Log mutations instead of performing them
    pub dry_run: bool,
    /// Continue an interrupted run
    pub resume: bool,
}

impl RunRequest {
    /// Request with a canonical published listing, no limit, not a dry run
    pub fn new(
        staging_tree: impl Into<PathBuf>,
        prod_tree: impl Into<PathBuf>,
        changelog: impl Into<PathBuf>,
    ) -> Self {
        RunRequest {
            staging_tree: staging_tree.into(),
            prod_tree: prod_tree.into(),
            prod_format: TreeFormat::Canonical,
            changelog: changelog.into(),
            limit: None,
            dry_run: false,
            resume: false,
        }
    }

    /// Set the dry-run flag
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the resume flag
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Limit the number of extracted rows
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Format of the published listing
    pub fn prod_format(mut self, format: TreeFormat) -> Self {
        self.prod_format = format;
        self
    }
}

/// What a publishing run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Id of the run
    pub run_id: String,
    /// Classification counts
    pub changes: ChangeCounts,
    /// Detail files rendered locally
    pub detail_files: Vec<PathBuf>,
    /// Remote path of the change-log
    pub changelog_path: String,
    /// Remote path of the tree listing
    pub tree_path: String,
    /// Remote paths uploaded (or that would be, on a dry run)
    pub pushed: Vec<String>,
    /// `.backup` copies left on disk
    pub backups: Vec<PathBuf>,
    /// Whether mutations were skipped
    pub dry_run: bool,
}

/// Result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SyncOutcome {
    /// Snapshots were equivalent; nothing was published
    NoChanges,
    /// Changes were published (or previewed, on a dry run)
    Published(SyncSummary),
}

/// Reconciles the published tree with the metadata store.
#[derive(Debug)]
pub struct SyncWorkflow<'a> {
    config: &'a Config,
    store: &'a dyn MetadataStore,
    archive: &'a dyn ArchiveStore,
    rules: FileTypeRules,
}

impl<'a> SyncWorkflow<'a> {
    /// Workflow over the given collaborators
    pub fn new(
        config: &'a Config,
        store: &'a dyn MetadataStore,
        archive: &'a dyn ArchiveStore,
    ) -> Self {
        SyncWorkflow {
            config,
            store,
            archive,
            rules: FileTypeRules::from(&config.file_types),
        }
    }

    fn scratch_dir(&self) -> &Path {
        &self.config.ctree.scratch_dir
    }

    fn changelog_row(&self) -> String {
        self.config
            .archive
            .absolutize(&self.config.ctree.changelog_remote_path)
    }

    fn tree_row(&self) -> String {
        self.config.archive.absolutize(&self.config.ctree.tree_remote_path)
    }

    /// Fail with `MissingRecord` unless the change-log and tree rows exist
    pub async fn check_required_rows(&self) -> ReconcileResult<()> {
        for name in [self.changelog_row(), self.tree_row()] {
            let row = self
                .store
                .fetch_row(&name)
                .await
                .map_err(|e| ReconcileError::metastore("check rows", &name, e))?;
            if row.is_none() {
                return Err(ReconcileError::MissingRecord(name));
            }
        }
        Ok(())
    }

    /// Extract the staging tree, parse the published tree and classify them.
    ///
    /// Only the staging tree file is written.
    pub async fn diff(
        &self,
        staging_tree: &Path,
        prod_tree: &Path,
        prod_format: TreeFormat,
        limit: Option<usize>,
    ) -> ReconcileResult<ChangeSet> {
        let extractor =
            SnapshotExtractor::for_run(self.store, &self.config.archive, &self.config.ctree);
        let (_, new) = extractor
            .extract(&TreeField::CANONICAL, staging_tree, limit)
            .await?;
        let old = Snapshot::read_tree(prod_tree, prod_format).await?;
        Ok(classify(&old, &new, self.config.ctree.move_detection))
    }

    /// Run the workflow
    pub async fn run(&self, request: &RunRequest) -> ReconcileResult<SyncOutcome> {
        let dry_run = request.dry_run;
        let mut checkpoint = self.open_checkpoint(request).await?;
        info!(run_id = %checkpoint.run_id, state = %checkpoint.state, dry_run, "Starting reconciliation");

        if matches!(checkpoint.state, WorkflowState::Idle | WorkflowState::SnapshotsComputed) {
            self.compute(&mut checkpoint, dry_run).await?;
        }

        let changes = checkpoint
            .changeset
            .clone()
            .ok_or_else(|| ReconcileError::invariant("checkpoint past Diffed without a ChangeSet"))?;
        changes.validate()?;

        if changes.is_empty() {
            remove_file_if_present(&checkpoint.staging_tree).await?;
            if !dry_run {
                RunCheckpoint::remove(self.scratch_dir()).await?;
            }
            info!(run_id = %checkpoint.run_id, state = %WorkflowState::NoOpExit, "No changes to publish");
            return Ok(SyncOutcome::NoChanges);
        }

        self.check_required_rows().await?;

        let detail_files = changes.render_detail_files(self.scratch_dir()).await?;
        if checkpoint.state == WorkflowState::Diffed {
            self.push_details(&detail_files, &mut checkpoint, dry_run).await?;
            self.advance(&mut checkpoint, WorkflowState::DetailsPushed, dry_run).await?;
        }
        if checkpoint.state == WorkflowState::DetailsPushed {
            self.update_changelog(&changes, &mut checkpoint, dry_run).await?;
            self.advance(&mut checkpoint, WorkflowState::ChangelogUpdated, dry_run).await?;
        }
        if checkpoint.state == WorkflowState::ChangelogUpdated {
            self.publish_tree(&mut checkpoint, dry_run).await?;
            self.advance(&mut checkpoint, WorkflowState::TreePublished, dry_run).await?;
        }

        let backups = self.finish(&checkpoint, dry_run).await?;
        let summary = SyncSummary {
            run_id: checkpoint.run_id.clone(),
            changes: changes.counts(),
            detail_files,
            changelog_path: self.config.ctree.changelog_remote_path.clone(),
            tree_path: self.config.ctree.tree_remote_path.clone(),
            pushed: checkpoint.pushed.clone(),
            backups,
            dry_run,
        };
        info!(
            run_id = %summary.run_id,
            state = %WorkflowState::Done,
            counts = %summary.changes,
            pushed = summary.pushed.len(),
            dry_run,
            "Reconciliation finished"
        );
        Ok(SyncOutcome::Published(summary))
    }

    async fn open_checkpoint(&self, request: &RunRequest) -> ReconcileResult<RunCheckpoint> {
        let existing = RunCheckpoint::load(self.scratch_dir()).await?;
        match existing {
            Some(checkpoint) if request.dry_run => {
                warn!(
                    run_id = %checkpoint.run_id,
                    state = %checkpoint.state,
                    "Unfinished run left in place; previewing a fresh run"
                );
                Ok(RunCheckpoint::start(request))
            }
            Some(checkpoint) if request.resume => {
                info!(run_id = %checkpoint.run_id, state = %checkpoint.state, "Resuming run");
                Ok(checkpoint)
            }
            Some(checkpoint) => Err(ReconcileError::UnfinishedRun {
                run_id: checkpoint.run_id,
                state: checkpoint.state,
            }),
            None => {
                if request.resume {
                    warn!("No checkpoint to resume; starting a new run");
                }
                Ok(RunCheckpoint::start(request))
            }
        }
    }

    async fn advance(
        &self,
        checkpoint: &mut RunCheckpoint,
        state: WorkflowState,
        dry_run: bool,
    ) -> ReconcileResult<()> {
        debug!(run_id = %checkpoint.run_id, from = %checkpoint.state, to = %state, "State transition");
        checkpoint.state = state;
        if !dry_run {
            checkpoint.save(self.scratch_dir()).await?;
        }
        Ok(())
    }

    async fn compute(&self, checkpoint: &mut RunCheckpoint, dry_run: bool) -> ReconcileResult<()> {
        let extractor =
            SnapshotExtractor::for_run(self.store, &self.config.archive, &self.config.ctree);
        let (_, new) = extractor
            .extract(&TreeField::CANONICAL, &checkpoint.staging_tree, checkpoint.limit)
            .await?;
        let old = Snapshot::read_tree(&checkpoint.prod_tree, checkpoint.prod_format).await?;
        self.advance(checkpoint, WorkflowState::SnapshotsComputed, dry_run).await?;

        let changes = classify(&old, &new, self.config.ctree.move_detection);
        info!(counts = %changes.counts(), "Snapshots classified");
        checkpoint.changeset = Some(changes);
        self.advance(checkpoint, WorkflowState::Diffed, dry_run).await
    }

    async fn push_details(
        &self,
        detail_files: &[PathBuf],
        checkpoint: &mut RunCheckpoint,
        dry_run: bool,
    ) -> ReconcileResult<()> {
        const STEP: &str = "push detail files";
        let details_dir = self.config.ctree.details_dir.trim_end_matches('/');

        for path in detail_files {
            let local = LocalFile::from_path(path).await?;
            let remote = format!("{}/{}", details_dir, local.basename());
            if checkpoint.pushed.contains(&remote) {
                debug!(remote = %remote, "Detail file already pushed");
                continue;
            }

            // A row at the final name means an earlier run (or an earlier
            // attempt of this one) already recorded a detail file there.
            let final_name = self.config.archive.absolutize(&remote);
            let recorded = self
                .store
                .fetch_row(&final_name)
                .await
                .map_err(|e| ReconcileError::metastore(STEP, &final_name, e))?;
            let staged = match recorded {
                Some(row) if row.md5 == local.md5 => {
                    debug!(name = %final_name, "Detail file row already recorded");
                    None
                }
                Some(_) => {
                    self.update_digest(STEP, &final_name, &local, dry_run).await?;
                    None
                }
                None => Some(self.record_detail_file(path, &local, dry_run).await?),
            };

            let published = self
                .archive
                .fetch_metadata(&remote)
                .await
                .map_err(|e| ReconcileError::archive(STEP, &remote, e))?;
            match published {
                Some(object) if object.md5 == local.md5 => {
                    debug!(remote = %remote, "Detail file already uploaded");
                }
                Some(_) => {
                    info!(remote = %remote, "Replacing detail file published earlier today");
                    self.replace_published(STEP, &local, &remote, checkpoint, dry_run)
                        .await?;
                }
                None => {
                    let request = UploadRequest::new(&local.path, &remote, &local.md5, local.size);
                    self.archive
                        .upload(&request, dry_run)
                        .await
                        .map_err(|e| ReconcileError::archive(STEP, &remote, e))?;
                }
            }

            if let Some(staged) = staged {
                let renamed = self
                    .store
                    .update_field(FileField::Name, &final_name, &staged, dry_run)
                    .await
                    .map_err(|e| ReconcileError::metastore(STEP, &staged, e))?;
                if renamed == 0 && !dry_run {
                    return Err(ReconcileError::MissingRecord(staged));
                }
            }

            info!(remote = %remote, dry_run, "Pushed detail file");
            if !checkpoint.pushed.contains(&remote) {
                checkpoint.pushed.push(remote);
            }
            if !dry_run {
                checkpoint.save(self.scratch_dir()).await?;
            }
        }
        Ok(())
    }

    /// Insert the row of a detail file under its local path and return that
    /// name.
    async fn record_detail_file(
        &self,
        path: &Path,
        local: &LocalFile,
        dry_run: bool,
    ) -> ReconcileResult<String> {
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| ReconcileError::io(path, e))?;
        let record = FileRecord::new(
            absolute.to_string_lossy(),
            local.md5.as_str(),
            local.size,
            DETAIL_FILE_TYPE,
        );
        match self.store.insert_row(&record, dry_run).await {
            Ok(_) => {}
            Err(e) if e.is_duplicate() => {
                debug!(name = %record.name, "Detail file row already recorded");
            }
            Err(e) => return Err(ReconcileError::metastore("push detail files", &record.name, e)),
        }
        Ok(record.name)
    }

    async fn update_changelog(
        &self,
        changes: &ChangeSet,
        checkpoint: &mut RunCheckpoint,
        dry_run: bool,
    ) -> ReconcileResult<()> {
        let reference = details_reference(
            &self.config.ctree.details_dir,
            &self.config.ctree.changelog_remote_path,
        );
        let entry = changes.render_changelog_entry(&self.rules, &reference)?;
        if dry_run {
            info!(dry_run = true, path = %checkpoint.changelog.display(), "Would prepend change-log entry:\n{}", entry);
        } else {
            prepend_entry(&checkpoint.changelog, &entry).await?;
        }

        let local = LocalFile::from_path(&checkpoint.changelog).await?;
        let remote = self.config.ctree.changelog_remote_path.clone();
        self.update_digest("update change-log", &self.changelog_row(), &local, dry_run)
            .await?;
        self.replace_published("publish change-log", &local, &remote, checkpoint, dry_run)
            .await
    }

    async fn publish_tree(&self, checkpoint: &mut RunCheckpoint, dry_run: bool) -> ReconcileResult<()> {
        let local = LocalFile::from_path(&checkpoint.staging_tree).await?;
        let remote = self.config.ctree.tree_remote_path.clone();
        self.update_digest("update tree", &self.tree_row(), &local, dry_run)
            .await?;
        self.replace_published("publish tree", &local, &remote, checkpoint, dry_run)
            .await
    }

    /// Record `local`'s hash and size on the row named `name`
    async fn update_digest(
        &self,
        step: &'static str,
        name: &str,
        local: &LocalFile,
        dry_run: bool,
    ) -> ReconcileResult<()> {
        let size = local.size.to_string();
        for (field, value) in [(FileField::Md5, local.md5.as_str()), (FileField::Size, size.as_str())] {
            let updated = self
                .store
                .update_field(field, value, name, dry_run)
                .await
                .map_err(|e| ReconcileError::metastore(step, name, e))?;
            if updated == 0 && !dry_run {
                return Err(ReconcileError::MissingRecord(name.to_string()));
            }
        }
        Ok(())
    }

    /// Back up, delete and re-upload the object published at `remote`.
    async fn replace_published(
        &self,
        step: &'static str,
        local: &LocalFile,
        remote: &str,
        checkpoint: &mut RunCheckpoint,
        dry_run: bool,
    ) -> ReconcileResult<()> {
        let basename = remote.rsplit('/').next().unwrap_or(remote);
        let backup = self
            .config
            .ctree
            .backup_dir
            .join(format!("{}.{}.backup", basename, checkpoint.backup_stamp()));

        let published = self
            .archive
            .fetch_metadata(remote)
            .await
            .map_err(|e| ReconcileError::archive(step, remote, e))?;

        match published {
            Some(object) if object.md5 == local.md5 && !dry_run => {
                info!(remote, "Published copy is already current");
                if !checkpoint.pushed.iter().any(|p| p == remote) {
                    checkpoint.pushed.push(remote.to_string());
                }
                return Ok(());
            }
            Some(object) => {
                if dry_run {
                    info!(dry_run = true, remote, backup = %backup.display(), "Would back up published copy");
                } else if !path_exists(&backup).await? {
                    self.archive
                        .download(remote, &backup)
                        .await
                        .map_err(|e| ReconcileError::archive(step, remote, e))?
                        .ok_or_else(|| ReconcileError::MissingRecord(remote.to_string()))?;
                    info!(remote, backup = %backup.display(), "Backed up published copy");
                }
                if !dry_run && !checkpoint.backups.contains(&backup) {
                    checkpoint.backups.push(backup.clone());
                    checkpoint.save(self.scratch_dir()).await?;
                }
                self.archive
                    .delete(&object.fire_oid, dry_run)
                    .await
                    .map_err(|e| ReconcileError::archive(step, remote, e))?;
            }
            None if path_exists(&backup).await? => {
                debug!(remote, "Published copy already deleted by this run");
                if !checkpoint.backups.contains(&backup) {
                    checkpoint.backups.push(backup.clone());
                }
            }
            None => return Err(ReconcileError::MissingRecord(remote.to_string())),
        }

        let request = UploadRequest::new(&local.path, remote, &local.md5, local.size);
        self.archive
            .upload(&request, dry_run)
            .await
            .map_err(|e| ReconcileError::archive(step, remote, e))?;
        info!(remote, md5 = %local.md5, dry_run, "Published");
        if !checkpoint.pushed.iter().any(|p| p == remote) {
            checkpoint.pushed.push(remote.to_string());
        }
        Ok(())
    }

    /// Clear the checkpoint and, unless kept, the backups.
    async fn finish(&self, checkpoint: &RunCheckpoint, dry_run: bool) -> ReconcileResult<Vec<PathBuf>> {
        if dry_run {
            return Ok(Vec::new());
        }
        RunCheckpoint::remove(self.scratch_dir()).await?;
        if self.config.ctree.keep_backups {
            return Ok(checkpoint.backups.clone());
        }
        for backup in &checkpoint.backups {
            remove_file_if_present(backup).await?;
        }
        Ok(Vec::new())
    }
}

async fn path_exists(path: &Path) -> ReconcileResult<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| ReconcileError::io(path, e))
}

async fn remove_file_if_present(path: &Path) -> ReconcileResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ReconcileError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(WorkflowState::Done.is_terminal());
        assert!(WorkflowState::NoOpExit.is_terminal());
        assert!(!WorkflowState::DetailsPushed.is_terminal());
        assert_eq!(WorkflowState::ChangelogUpdated.to_string(), "ChangelogUpdated");
    }

    #[test]
    fn test_request_builder() {
        let request = RunRequest::new("s.tree", "p.tree", "CHANGELOG")
            .dry_run(true)
            .limit(Some(10))
            .prod_format(TreeFormat::LegacyHeader);
        assert!(request.dry_run);
        assert!(!request.resume);
        assert_eq!(request.limit, Some(10));
        assert_eq!(request.prod_format, TreeFormat::LegacyHeader);
    }
}
