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

//! Reconciliation error types

use crate::workflow::WorkflowState;
use ctree_archive::ArchiveError;
use ctree_config::ConfigError;
use ctree_metastore::MetastoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors raised by the reconciliation engine.
///
/// Collaborator failures carry the workflow step and the path involved so an
/// operator can pick up from the `.backup` copies by hand.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Configuration missing or invalid; raised before any collaborator call
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Tree listing header is unusable
    #[error("Malformed tree listing {} at line {line}: {reason}", path.display())]
    MalformedTree {
        /// Listing being parsed
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// Internal consistency check failed
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// No file-type rule matches a changed path
    #[error("No file type for {path} (extension '{extension}')")]
    UnknownFileType {
        /// Changed path
        path: String,
        /// Extension that was looked up
        extension: String,
    },

    /// A metadata row the workflow depends on does not exist
    #[error("No metadata row for {0}")]
    MissingRecord(String),

    /// Metadata store call failed
    #[error("Metadata store failed during {step} for {path}: {source}")]
    Metastore {
        /// Workflow step
        step: &'static str,
        /// Row involved
        path: String,
        /// Underlying error
        source: MetastoreError,
    },

    /// Remote store call failed
    #[error("Remote store failed during {step} for {path}: {source}")]
    Archive {
        /// Workflow step
        step: &'static str,
        /// Remote or local path involved
        path: String,
        /// Underlying error
        source: ArchiveError,
    },

    /// A previous run stopped before finishing
    #[error("Run {run_id} stopped in state {state}; resume it or discard its checkpoint")]
    UnfinishedRun {
        /// Id of the interrupted run
        run_id: String,
        /// Last recorded state
        state: WorkflowState,
    },
}

impl ReconcileError {
    /// Create an Io error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReconcileError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an Invariant error with context
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        ReconcileError::Invariant(msg.into())
    }

    /// Create a MalformedTree error
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        ReconcileError::MalformedTree {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Wrap a metadata store failure with its step and path
    pub fn metastore(step: &'static str, path: impl Into<String>, source: MetastoreError) -> Self {
        ReconcileError::Metastore {
            step,
            path: path.into(),
            source,
        }
    }

    /// Wrap a remote store failure with its step and path
    pub fn archive(step: &'static str, path: impl Into<String>, source: ArchiveError) -> Self {
        ReconcileError::Archive {
            step,
            path: path.into(),
            source,
        }
    }

    /// True when a collaborator call failed
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            ReconcileError::Metastore { .. } | ReconcileError::Archive { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_step_and_path() {
        let err = ReconcileError::archive(
            "publish tree",
            "ftp/current.tree",
            ArchiveError::backend("refused"),
        );
        let msg = err.to_string();
        assert!(msg.contains("publish tree"));
        assert!(msg.contains("ftp/current.tree"));
        assert!(err.is_collaborator_failure());
    }

    #[test]
    fn test_malformed_message() {
        let err = ReconcileError::malformed("/tmp/old.tree", 1, "no md5 column");
        assert_eq!(
            err.to_string(),
            "Malformed tree listing /tmp/old.tree at line 1: no md5 column"
        );
        assert!(!err.is_collaborator_failure());
    }
}
