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

//! Classified differences between two snapshots, and their rendering as
//! detail files and change-log entries.

use crate::error::{ReconcileError, ReconcileResult};
use crate::file_type::FileTypeRules;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix shared by every detail file name
pub const DETAIL_FILE_PREFIX: &str = "changelog_details";

/// Change kind, in rendering order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Added content
    New,
    /// Removed content
    Withdrawn,
    /// Same content under a new path
    Moved,
    /// New content under the same path
    Replaced,
}

impl ChangeKind {
    /// Every kind, in the order entries and detail files are rendered
    pub const ALL: [ChangeKind; 4] = [
        ChangeKind::New,
        ChangeKind::Withdrawn,
        ChangeKind::Moved,
        ChangeKind::Replaced,
    ];

    /// Suffix used in detail file names
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::New => "new",
            ChangeKind::Withdrawn => "withdrawn",
            ChangeKind::Moved => "moved",
            ChangeKind::Replaced => "replaced",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hashes of a path whose content changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    /// Hash in the new snapshot
    pub new_md5: String,
    /// Hash in the published snapshot
    pub old_md5: String,
}

/// Number of paths per change kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    /// Added paths
    pub new: usize,
    /// Removed paths
    pub withdrawn: usize,
    /// Moved paths
    pub moved: usize,
    /// Paths with new content
    pub replaced: usize,
}

impl ChangeCounts {
    /// Sum over every kind
    pub fn total(&self) -> usize {
        self.new + self.withdrawn + self.moved + self.replaced
    }
}

impl fmt::Display for ChangeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new: {}, withdrawn: {}, moved: {}, replaced: {}",
            self.new, self.withdrawn, self.moved, self.replaced
        )
    }
}

/// Result of one classification.
///
/// Every path appears in at most one bucket; moves are keyed by the old path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Paths with content not seen before
    pub new: BTreeSet<String>,
    /// Paths whose content is gone
    pub withdrawn: BTreeSet<String>,
    /// Old path to new path
    pub moved: BTreeMap<String, String>,
    /// Path to its new and old hash
    pub replaced: BTreeMap<String, Replacement>,
    /// When the classification ran; dates every rendered artifact
    pub timestamp: DateTime<Local>,
}

impl ChangeSet {
    /// ChangeSet stamped with the current time
    pub fn new(
        new: BTreeSet<String>,
        withdrawn: BTreeSet<String>,
        moved: BTreeMap<String, String>,
        replaced: BTreeMap<String, Replacement>,
    ) -> Self {
        ChangeSet {
            new,
            withdrawn,
            moved,
            replaced,
            timestamp: Local::now(),
        }
    }

    /// ChangeSet with no changes
    pub fn empty() -> Self {
        Self::new(BTreeSet::new(), BTreeSet::new(), BTreeMap::new(), BTreeMap::new())
    }

    /// Total number of changed paths
    pub fn size(&self) -> usize {
        self.counts().total()
    }

    /// True when both snapshots were equivalent
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Per-kind counts
    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            new: self.new.len(),
            withdrawn: self.withdrawn.len(),
            moved: self.moved.len(),
            replaced: self.replaced.len(),
        }
    }

    /// Paths listed for `kind`; moves are listed by their old path
    pub fn paths(&self, kind: ChangeKind) -> Vec<&str> {
        match kind {
            ChangeKind::New => self.new.iter().map(String::as_str).collect(),
            ChangeKind::Withdrawn => self.withdrawn.iter().map(String::as_str).collect(),
            ChangeKind::Moved => self.moved.keys().map(String::as_str).collect(),
            ChangeKind::Replaced => self.replaced.keys().map(String::as_str).collect(),
        }
    }

    /// Kinds with at least one path, in rendering order
    pub fn kinds(&self) -> Vec<ChangeKind> {
        ChangeKind::ALL
            .into_iter()
            .filter(|k| !self.paths(*k).is_empty())
            .collect()
    }

    /// Fail if any path sits in more than one bucket
    pub fn validate(&self) -> ReconcileResult<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        let all = self
            .new
            .iter()
            .chain(&self.withdrawn)
            .chain(self.moved.keys())
            .chain(self.moved.values())
            .chain(self.replaced.keys());
        for path in all {
            if !seen.insert(path.as_str()) {
                return Err(ReconcileError::invariant(format!(
                    "{} appears in more than one change bucket",
                    path
                )));
            }
        }
        Ok(())
    }

    /// `changelog_details_<YYYYMMDD>_<kind>`
    pub fn detail_file_name(&self, kind: ChangeKind) -> String {
        format!(
            "{}_{}_{}",
            DETAIL_FILE_PREFIX,
            self.timestamp.format("%Y%m%d"),
            kind
        )
    }

    /// Body of the detail file for `kind`.
    ///
    /// Moves are written as `old<TAB>new`; every other kind is a path list.
    pub fn detail_content(&self, kind: ChangeKind) -> String {
        let mut out = String::new();
        match kind {
            ChangeKind::Moved => {
                for (old, new) in &self.moved {
                    out.push_str(old);
                    out.push('\t');
                    out.push_str(new);
                    out.push('\n');
                }
            }
            _ => {
                for path in self.paths(kind) {
                    out.push_str(path);
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Write one detail file per non-empty kind into `dir`
    pub async fn render_detail_files(&self, dir: impl AsRef<Path>) -> ReconcileResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let mut written = Vec::new();
        for kind in self.kinds() {
            let path = dir.join(self.detail_file_name(kind));
            crate::write_atomic(&path, self.detail_content(kind).as_bytes()).await?;
            debug!(kind = %kind, path = %path.display(), "Wrote detail file");
            written.push(path);
        }
        Ok(written)
    }

    /// Change-log entry for this run.
    ///
    /// `details_ref` is the directory the pointer lines name, as seen from
    /// the change-log.
    pub fn render_changelog_entry(
        &self,
        rules: &FileTypeRules,
        details_ref: &str,
    ) -> ReconcileResult<String> {
        let mut entry = format!("{}\n\n", self.timestamp.format("%Y-%m-%d"));
        for kind in self.kinds() {
            let tags = self
                .paths(kind)
                .into_iter()
                .map(|p| rules.guess(p).map(str::to_lowercase))
                .collect::<ReconcileResult<BTreeSet<String>>>()?;
            let tags: Vec<String> = tags.into_iter().collect();

            entry.push_str(&format!("Modification to: {}\n\n", tags.join(",")));
            entry.push_str(&format!(
                "Details can be found in\n{}/{}\n\n",
                details_ref.trim_end_matches('/'),
                self.detail_file_name(kind)
            ));
        }
        Ok(entry)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample() -> ChangeSet {
        let mut changes = ChangeSet::new(
            ["ftp/data/new.cram".to_string(), "ftp/data/new.crai".to_string()].into(),
            ["ftp/data/old.vcf.gz".to_string()].into(),
            [("ftp/a/x.bam".to_string(), "ftp/b/x.bam".to_string())].into(),
            [(
                "ftp/data/fix.CRAM".to_string(),
                Replacement {
                    new_md5: "n".to_string(),
                    old_md5: "o".to_string(),
                },
            )]
            .into(),
        );
        changes.timestamp = Local.with_ymd_and_hms(2021, 3, 4, 10, 0, 0).unwrap();
        changes
    }

    fn rules() -> FileTypeRules {
        FileTypeRules::new([
            ("cram", "CRAM"),
            ("crai", "CRAI"),
            ("gz", "VCF"),
            ("bam", "BAM"),
        ])
    }

    #[test]
    fn test_counts_and_size() {
        let changes = sample();
        assert_eq!(changes.size(), 5);
        assert_eq!(changes.counts().new, 2);
        assert!(ChangeSet::empty().is_empty());
        assert!(ChangeSet::empty().kinds().is_empty());
    }

    #[test]
    fn test_validate_detects_overlap() {
        let mut changes = sample();
        changes.validate().unwrap();
        changes.withdrawn.insert("ftp/b/x.bam".to_string());
        assert!(matches!(changes.validate(), Err(ReconcileError::Invariant(_))));
    }

    #[test]
    fn test_detail_names_and_content() {
        let changes = sample();
        assert_eq!(
            changes.detail_file_name(ChangeKind::Moved),
            "changelog_details_20210304_moved"
        );
        assert_eq!(changes.detail_content(ChangeKind::Moved), "ftp/a/x.bam\tftp/b/x.bam\n");
        assert_eq!(
            changes.detail_content(ChangeKind::New),
            "ftp/data/new.crai\nftp/data/new.cram\n"
        );
        // Replaced lists paths only, never hashes.
        assert_eq!(changes.detail_content(ChangeKind::Replaced), "ftp/data/fix.CRAM\n");
    }

    #[tokio::test]
    async fn test_render_detail_files_skips_empty_kinds() {
        let mut changes = sample();
        changes.withdrawn.clear();
        let temp_dir = TempDir::new().unwrap();

        let written = changes.render_detail_files(temp_dir.path()).await.unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "changelog_details_20210304_new",
                "changelog_details_20210304_moved",
                "changelog_details_20210304_replaced",
            ]
        );
    }

    #[test]
    fn test_changelog_entry() {
        let entry = sample()
            .render_changelog_entry(&rules(), "changelog_details")
            .unwrap();
        let expected = "2021-03-04\n\n\
            Modification to: crai,cram\n\n\
            Details can be found in\nchangelog_details/changelog_details_20210304_new\n\n\
            Modification to: vcf\n\n\
            Details can be found in\nchangelog_details/changelog_details_20210304_withdrawn\n\n\
            Modification to: bam\n\n\
            Details can be found in\nchangelog_details/changelog_details_20210304_moved\n\n\
            Modification to: cram\n\n\
            Details can be found in\nchangelog_details/changelog_details_20210304_replaced\n\n";
        assert_eq!(entry, expected);
    }

    #[test]
    fn test_changelog_entry_unknown_type() {
        let err = sample()
            .render_changelog_entry(&FileTypeRules::default(), "changelog_details")
            .unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownFileType { .. }));
    }

    #[test]
    fn test_serde_keeps_timestamp() {
        let changes = sample();
        let json = serde_json::to_string(&changes).unwrap();
        let back: ChangeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, changes);
    }
}
