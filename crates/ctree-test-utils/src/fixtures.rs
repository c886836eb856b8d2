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

//! Rows, listings and remote objects for a small archive

use ctree_archive::MockArchive;
use ctree_config::Config;
use ctree_metastore::{FileRecord, MemoryStore};

/// Mount prefix of the published tree in test configs
pub const FTP_MOUNT: &str = "/nfs/vol1";

/// Mount prefix of the staging area in test configs
pub const STAGING_MOUNT: &str = "/nfs/staging";

/// Metadata row for an archive-relative path
pub fn record(relative: &str, md5: &str, file_type: &str) -> FileRecord {
    let mut record = FileRecord::new(format!("{}/{}", FTP_MOUNT, relative), md5, 100, file_type);
    record.created = "2021-01-01 00:00:00".to_string();
    record
}

/// Canonical tree listing for `(path, md5)` pairs
pub fn canonical_tree(entries: &[(&str, &str)]) -> String {
    entries
        .iter()
        .map(|(path, md5)| format!("{}\tfile\t100\t2021-01-01 00:00:00\t{}\n", path, md5))
        .collect()
}

/// Seed what a publishable archive needs besides the data rows: the
/// change-log and tree rows in `store`, and their published objects in
/// `archive`.
pub async fn seed_published(
    config: &Config,
    store: &MemoryStore,
    archive: &MockArchive,
    published_tree: &str,
    published_changelog: &str,
) {
    let changelog = archive
        .seed(&config.ctree.changelog_remote_path, published_changelog.as_bytes())
        .await;
    let tree = archive
        .seed(&config.ctree.tree_remote_path, published_tree.as_bytes())
        .await;

    let mut changelog_row = FileRecord::new(
        config.archive.absolutize(&config.ctree.changelog_remote_path),
        changelog.md5,
        changelog.size,
        "CHANGELOG",
    );
    changelog_row.created = "2021-01-01 00:00:00".to_string();
    let mut tree_row = FileRecord::new(
        config.archive.absolutize(&config.ctree.tree_remote_path),
        tree.md5,
        tree.size,
        "TREE",
    );
    tree_row.created = "2021-01-01 00:00:00".to_string();
    store.seed([changelog_row, tree_row]).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_tree() {
        assert_eq!(
            canonical_tree(&[("ftp/a", "h")]),
            "ftp/a\tfile\t100\t2021-01-01 00:00:00\th\n"
        );
    }

    #[test]
    fn test_record_is_absolute() {
        assert_eq!(record("ftp/a.cram", "h", "CRAM").name, "/nfs/vol1/ftp/a.cram");
    }
}
