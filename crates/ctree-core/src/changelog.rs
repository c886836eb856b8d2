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

//! Working copy of the change-log

use crate::error::{ReconcileError, ReconcileResult};
use std::path::Path;
use tracing::{debug, info};

/// Directory named by the pointer lines of a change-log entry.
///
/// The pointer is relative to the directory holding the change-log, so with
/// the change-log at `ftp/CHANGELOG` and details under
/// `ftp/changelog_details` entries point at `changelog_details`.
pub fn details_reference(details_dir: &str, changelog_remote_path: &str) -> String {
    let details_dir = details_dir.trim_matches('/');
    let parent = changelog_remote_path
        .trim_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    if parent.is_empty() {
        return details_dir.to_string();
    }
    details_dir
        .strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(details_dir)
        .to_string()
}

/// Put `entry` at the top of the change-log at `path`.
///
/// Returns `false` without touching the file when it already starts with
/// `entry`, which happens when an interrupted run is resumed.
pub async fn prepend_entry(path: impl AsRef<Path>, entry: &str) -> ReconcileResult<bool> {
    let path = path.as_ref();
    let existing = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ReconcileError::io(path, e))?;

    if !entry.is_empty() && existing.starts_with(entry) {
        debug!(path = %path.display(), "Change-log already starts with this entry");
        return Ok(false);
    }

    let mut updated = String::with_capacity(entry.len() + existing.len());
    updated.push_str(entry);
    updated.push_str(&existing);
    crate::write_atomic(path, updated.as_bytes()).await?;
    info!(path = %path.display(), bytes = entry.len(), "Prepended change-log entry");
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_details_reference() {
        assert_eq!(
            details_reference("ftp/changelog_details", "ftp/CHANGELOG"),
            "changelog_details"
        );
        assert_eq!(details_reference("ftp/changelog_details/", "CHANGELOG"), "ftp/changelog_details");
        assert_eq!(details_reference("other/details", "ftp/CHANGELOG"), "other/details");
        assert_eq!(details_reference("ftpx/details", "ftp/CHANGELOG"), "ftpx/details");
    }

    #[tokio::test]
    async fn test_prepend_is_newest_first_and_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("CHANGELOG");
        std::fs::write(&path, "2020-01-01\n\nolder entry\n").unwrap();

        assert!(prepend_entry(&path, "2021-03-04\n\nnewer entry\n\n").await.unwrap());
        assert!(!prepend_entry(&path, "2021-03-04\n\nnewer entry\n\n").await.unwrap());

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "2021-03-04\n\nnewer entry\n\n2020-01-01\n\nolder entry\n"
        );
    }

    #[tokio::test]
    async fn test_prepend_requires_working_copy() {
        let temp_dir = TempDir::new().unwrap();
        let err = prepend_entry(temp_dir.path().join("missing"), "x").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Io { .. }));
    }
}
