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

//! Tree listings and the snapshots parsed from them
//!
//! A tree listing is a UTF-8 text file with one tab-separated entry per line:
//!
//! ```text
//! path<TAB>type<TAB>size<TAB>updated<TAB>md5
//! ```
//!
//! `type` is `file` or `directory`. Parsing keeps the `path -> md5` pairs of
//! every `file` line and skips everything else without failing.
//!
//! An older variant starts with a header line naming the columns. It is read
//! only when [`TreeFormat::LegacyHeader`] is requested explicitly.

use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

/// Entry kind that marks a directory line
const DIRECTORY_KIND: &str = "directory";

/// Entry kind written for every extracted row
pub const FILE_KIND: &str = "file";

/// Number of fields in a canonical line
const CANONICAL_FIELDS: usize = 5;

/// Layout of a tree listing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TreeFormat {
    /// Headerless `path, type, size, updated, md5` lines
    #[default]
    Canonical,

    /// First line names the columns; `name` and `md5` are required
    LegacyHeader,
}

/// Archive-relative path to content hash.
///
/// Backed by a `BTreeMap` so every traversal is in lexicographic path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    entries: BTreeMap<String, String>,
}

impl Snapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path -> md5`, returning the previous hash if any
    pub fn insert(&mut self, path: impl Into<String>, md5: impl Into<String>) -> Option<String> {
        self.entries.insert(path.into(), md5.into())
    }

    /// Hash recorded for `path`
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// True if `path` is present
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no path is recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths in lexicographic order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(path, md5)` pairs in lexicographic path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, h)| (p.as_str(), h.as_str()))
    }

    /// Parse a listing held in memory.
    ///
    /// `source` only names the listing in error messages.
    pub fn parse_str(content: &str, format: TreeFormat, source: &Path) -> ReconcileResult<Self> {
        match format {
            TreeFormat::Canonical => Ok(parse_canonical(content)),
            TreeFormat::LegacyHeader => parse_legacy(content, source),
        }
    }

    /// Read and parse a listing file
    pub async fn read_tree(path: impl AsRef<Path>, format: TreeFormat) -> ReconcileResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReconcileError::io(path, e))?;
        let snapshot = Self::parse_str(&content, format, path)?;
        debug!(
            path = %path.display(),
            entries = snapshot.len(),
            format = ?format,
            "Parsed tree listing"
        );
        Ok(snapshot)
    }

    /// Canonical listing for this snapshot.
    ///
    /// Size and update time are not part of a snapshot, so they are written
    /// as `0` and an empty field.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, md5) in self.iter() {
            out.push_str(path);
            out.push('\t');
            out.push_str(FILE_KIND);
            out.push_str("\t0\t\t");
            out.push_str(md5);
            out.push('\n');
        }
        out
    }

    /// Write [`render`](Self::render) to `path` atomically
    pub async fn write_tree(&self, path: impl AsRef<Path>) -> ReconcileResult<()> {
        crate::write_atomic(path.as_ref(), self.render().as_bytes()).await
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Snapshot {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(p, h)| (p.to_string(), h.to_string()))
            .collect()
    }
}

fn split_line(line: &str) -> Vec<&str> {
    line.trim_end_matches('\r').split('\t').collect()
}

fn parse_canonical(content: &str) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for (idx, line) in content.lines().enumerate() {
        let fields = split_line(line);
        if fields.len() != CANONICAL_FIELDS {
            trace!(line = idx + 1, fields = fields.len(), "Skipping malformed tree line");
            continue;
        }
        if fields[1] == DIRECTORY_KIND {
            continue;
        }
        snapshot.insert(fields[0], fields[4]);
    }
    snapshot
}

fn parse_legacy(content: &str, source: &Path) -> ReconcileResult<Snapshot> {
    let mut lines = content.lines();
    let header = lines
        .next()
        .ok_or_else(|| ReconcileError::malformed(source, 1, "missing header line"))?;
    let columns = split_line(header);
    let position = |name: &str| columns.iter().position(|c| c.trim() == name);

    let name_idx = position("name")
        .ok_or_else(|| ReconcileError::malformed(source, 1, "header has no 'name' column"))?;
    let md5_idx = position("md5")
        .ok_or_else(|| ReconcileError::malformed(source, 1, "header has no 'md5' column"))?;
    let type_idx = position("type");

    let mut snapshot = Snapshot::new();
    for (idx, line) in lines.enumerate() {
        let fields = split_line(line);
        if fields.len() != columns.len() {
            trace!(line = idx + 2, fields = fields.len(), "Skipping malformed tree line");
            continue;
        }
        if type_idx.is_some_and(|t| fields[t] == DIRECTORY_KIND) {
            continue;
        }
        snapshot.insert(fields[name_idx], fields[md5_idx]);
    }
    Ok(snapshot)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn source() -> &'static Path {
        Path::new("current.tree")
    }

    #[test]
    fn test_canonical_skips_directories_and_junk() {
        let content = "ftp\tdirectory\t4096\t2020-01-01\t\n\
                       ftp/a.cram\tfile\t10\t2020-01-01\taaa\n\
                       ftp/b.cram\tfile\t10\n\
                       \n\
                       ftp/c.vcf.gz\tfile\t5\t2020-01-02\tccc\r\n";
        let snapshot = Snapshot::parse_str(content, TreeFormat::Canonical, source()).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("ftp/a.cram"), Some("aaa"));
        assert_eq!(snapshot.get("ftp/c.vcf.gz"), Some("ccc"));
        assert!(!snapshot.contains("ftp"));
    }

    #[test]
    fn test_legacy_header_columns_in_any_order() {
        let content = "md5\tname\ttype\n\
                       aaa\tftp/a.cram\tfile\n\
                       \tftp/dir\tdirectory\n\
                       short\n";
        let snapshot = Snapshot::parse_str(content, TreeFormat::LegacyHeader, source()).unwrap();
        assert_eq!(snapshot.iter().collect::<Vec<_>>(), vec![("ftp/a.cram", "aaa")]);
    }

    #[test]
    fn test_legacy_header_requires_md5() {
        let err = Snapshot::parse_str("name\tsize\n", TreeFormat::LegacyHeader, source()).unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedTree { line: 1, .. }));

        let err = Snapshot::parse_str("", TreeFormat::LegacyHeader, source()).unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedTree { .. }));
    }

    #[test]
    fn test_canonical_never_reads_a_header() {
        let content = "name\ttype\tsize\tupdated\tmd5\n";
        let snapshot = Snapshot::parse_str(content, TreeFormat::Canonical, source()).unwrap();
        // A five-column header is just another line in the canonical format.
        assert_eq!(snapshot.get("name"), Some("md5"));
    }

    #[test]
    fn test_render_round_trip() {
        let snapshot: Snapshot = [("ftp/b.txt", "h2"), ("ftp/a.txt", "h1")].into_iter().collect();
        let rendered = snapshot.render();
        assert_eq!(rendered, "ftp/a.txt\tfile\t0\t\th1\nftp/b.txt\tfile\t0\t\th2\n");
        assert_eq!(
            Snapshot::parse_str(&rendered, TreeFormat::Canonical, source()).unwrap(),
            snapshot
        );
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = Snapshot::read_tree("/definitely/not/here.tree", TreeFormat::Canonical)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Io { .. }));
    }
}
