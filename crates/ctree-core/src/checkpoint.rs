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

//! Persisted progress of a reconciliation run
//!
//! A run writes its checkpoint to `<scratch_dir>/ctree.checkpoint.json` after
//! every state transition. The checkpoint carries the ChangeSet computed by
//! the run, so a resumed run publishes exactly what the interrupted one
//! classified, dated the same day.

use crate::changeset::ChangeSet;
use crate::error::{ReconcileError, ReconcileResult};
use crate::snapshot::TreeFormat;
use crate::workflow::{RunRequest, WorkflowState};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// File name of the checkpoint inside the scratch directory
pub const CHECKPOINT_FILE: &str = "ctree.checkpoint.json";

/// Progress of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Random id of the run
    pub run_id: String,

    /// Last state reached
    pub state: WorkflowState,

    /// When the run started; also stamps backup names
    pub started_at: DateTime<Local>,

    /// Classification, once computed
    pub changeset: Option<ChangeSet>,

    /// Listing extracted from the metadata store
    pub staging_tree: PathBuf,

    /// Previously published listing
    pub prod_tree: PathBuf,

    /// Format of `prod_tree`
    pub prod_format: TreeFormat,

    /// Working copy of the change-log
    pub changelog: PathBuf,

    /// Row limit applied to the extraction
    pub limit: Option<usize>,

    /// Remote paths uploaded so far
    pub pushed: Vec<String>,

    /// `.backup` copies downloaded so far
    pub backups: Vec<PathBuf>,
}

impl RunCheckpoint {
    /// Fresh checkpoint in state `Idle` for `request`
    pub fn start(request: &RunRequest) -> Self {
        RunCheckpoint {
            run_id: Uuid::new_v4().to_string(),
            state: WorkflowState::Idle,
            started_at: Local::now(),
            changeset: None,
            staging_tree: request.staging_tree.clone(),
            prod_tree: request.prod_tree.clone(),
            prod_format: request.prod_format,
            changelog: request.changelog.clone(),
            limit: request.limit,
            pushed: Vec::new(),
            backups: Vec::new(),
        }
    }

    /// Location of the checkpoint under `scratch_dir`
    pub fn path_in(scratch_dir: &Path) -> PathBuf {
        scratch_dir.join(CHECKPOINT_FILE)
    }

    /// Checkpoint left in `scratch_dir`, if any
    pub async fn load(scratch_dir: &Path) -> ReconcileResult<Option<Self>> {
        let path = Self::path_in(scratch_dir);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ReconcileError::io(&path, e)),
        };
        let checkpoint: RunCheckpoint = serde_json::from_str(&content).map_err(|e| {
            ReconcileError::invariant(format!("unreadable checkpoint {}: {}", path.display(), e))
        })?;
        debug!(run_id = %checkpoint.run_id, state = %checkpoint.state, "Loaded checkpoint");
        Ok(Some(checkpoint))
    }

    /// Write the checkpoint atomically
    pub async fn save(&self, scratch_dir: &Path) -> ReconcileResult<()> {
        let path = Self::path_in(scratch_dir);
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ReconcileError::invariant(format!("cannot encode checkpoint: {}", e)))?;
        crate::write_atomic(&path, &json).await?;
        debug!(run_id = %self.run_id, state = %self.state, "Saved checkpoint");
        Ok(())
    }

    /// Delete the checkpoint in `scratch_dir`; `false` if there was none
    pub async fn remove(scratch_dir: &Path) -> ReconcileResult<bool> {
        let path = Self::path_in(scratch_dir);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "Removed checkpoint");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ReconcileError::io(&path, e)),
        }
    }

    /// Stamp used in backup file names
    pub fn backup_stamp(&self) -> String {
        self.started_at.format("%Y%m%d%H%M%S").to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request() -> RunRequest {
        RunRequest::new("/work/staging.tree", "/work/current.tree", "/work/CHANGELOG")
    }

    #[tokio::test]
    async fn test_save_load_remove() {
        let temp_dir = TempDir::new().unwrap();
        assert!(RunCheckpoint::load(temp_dir.path()).await.unwrap().is_none());

        let mut checkpoint = RunCheckpoint::start(&request());
        checkpoint.state = WorkflowState::Diffed;
        checkpoint.changeset = Some(ChangeSet::empty());
        checkpoint.pushed.push("ftp/changelog_details/x".to_string());
        checkpoint.save(temp_dir.path()).await.unwrap();

        let loaded = RunCheckpoint::load(temp_dir.path()).await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint);

        assert!(RunCheckpoint::remove(temp_dir.path()).await.unwrap());
        assert!(!RunCheckpoint::remove(temp_dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(RunCheckpoint::path_in(temp_dir.path()), "{not json").unwrap();
        assert!(RunCheckpoint::load(temp_dir.path()).await.is_err());
    }

    #[test]
    fn test_fresh_runs_get_distinct_ids() {
        let a = RunCheckpoint::start(&request());
        let b = RunCheckpoint::start(&request());
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.state, WorkflowState::Idle);
        assert_eq!(a.backup_stamp().len(), 14);
    }
}
