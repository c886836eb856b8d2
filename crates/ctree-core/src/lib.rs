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

//! Reconciliation engine for a published archive tree
//!
//! `ctree-core` compares the tree listing currently published by the archive
//! with the rows of the metadata store, classifies every difference, and
//! republishes the listing together with a dated change-log entry.
//!
//! # Pieces
//!
//! - [`Snapshot`]: archive-relative path to MD5, parsed from a tree listing
//! - [`SnapshotExtractor`]: dumps the metadata store into a listing and a
//!   snapshot
//! - [`classify`]: the diff engine, producing a [`ChangeSet`]
//! - [`ChangeSet`]: new / withdrawn / moved / replaced buckets, rendered as
//!   detail files and change-log entries
//! - [`SyncWorkflow`]: the state machine that pushes everything to the
//!   remote store, with dry-run, backups and a resumable [`RunCheckpoint`]
//!
//! # Example
//!
//! ```rust
//! use ctree_config::MoveDetection;
//! use ctree_core::{classify, Snapshot};
//!
//! let old: Snapshot = [("ftp/a/x.txt", "H1")].into_iter().collect();
//! let new: Snapshot = [("ftp/b/x.txt", "H1")].into_iter().collect();
//!
//! let changes = classify(&old, &new, MoveDetection::Positional);
//! assert_eq!(changes.moved.get("ftp/a/x.txt").map(String::as_str), Some("ftp/b/x.txt"));
//! assert!(changes.new.is_empty() && changes.withdrawn.is_empty());
//! ```

pub mod changelog;
pub mod changeset;
pub mod checkpoint;
pub mod diff;
pub mod error;
pub mod extractor;
pub mod file_type;
pub mod local_file;
pub mod snapshot;
pub mod workflow;

pub use changelog::{details_reference, prepend_entry};
pub use changeset::{ChangeCounts, ChangeKind, ChangeSet, Replacement};
pub use checkpoint::{RunCheckpoint, CHECKPOINT_FILE};
pub use diff::classify;
pub use error::{ReconcileError, ReconcileResult};
pub use extractor::{SnapshotExtractor, TreeField};
pub use file_type::FileTypeRules;
pub use local_file::LocalFile;
pub use snapshot::{Snapshot, TreeFormat};
pub use workflow::{RunRequest, SyncOutcome, SyncSummary, SyncWorkflow, WorkflowState};

use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Write `content` to `path` through a temporary sibling and a rename.
///
/// Parent directories are created as needed. On failure the temporary file
/// is removed and `path` is left as it was.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> ReconcileResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ReconcileError::io(parent, e))?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| ReconcileError::invariant(format!("{} has no file name", path.display())))?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let result = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(ReconcileError::io(path, e));
    }
    Ok(())
}
