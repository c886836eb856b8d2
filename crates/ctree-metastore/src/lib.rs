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

//! File metadata store for ctree
//!
//! The metadata store is the source of truth for what should be published:
//! one row per archived file, keyed by its absolute path (`name`). The
//! reconciler reads the current rows to build a snapshot and writes back the
//! rows for the artifacts it publishes (tree listing, change-log, detail
//! files).
//!
//! Two implementations of [`MetadataStore`] are provided:
//!
//! - [`SqliteStore`]: a `file` table in a SQLite database
//! - [`MemoryStore`]: an in-memory map with a mutation journal, for tests
//!
//! Every mutating method takes a `dry_run` flag; a dry run logs the change it
//! would make and leaves the store untouched.

pub mod error;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use error::{MetastoreError, MetastoreResult};
pub use memory::{MemoryStore, StoreOp};
pub use sqlite::SqliteStore;

/// Format used for `created` / `updated` columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIMESTAMP_FORMAT`]
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One row of the `file` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Store-assigned id; `None` before insertion
    pub file_id: Option<i64>,

    /// Absolute path, unique
    pub name: String,

    /// MD5 of the content (hex)
    pub md5: String,

    /// Size in bytes
    pub size: u64,

    /// Classification tag (e.g. `CRAM`, `CHANGELOG`)
    pub file_type: String,

    /// Host on which the path is visible
    pub host_id: i64,

    /// Withdrawn rows are kept but no longer published
    pub withdrawn: bool,

    /// Creation time
    pub created: String,

    /// Time of the last update, if any
    pub updated: Option<String>,
}

impl FileRecord {
    /// New, not yet inserted record created now on host 1
    pub fn new(
        name: impl Into<String>,
        md5: impl Into<String>,
        size: u64,
        file_type: impl Into<String>,
    ) -> Self {
        FileRecord {
            file_id: None,
            name: name.into(),
            md5: md5.into(),
            size,
            file_type: file_type.into(),
            host_id: 1,
            withdrawn: false,
            created: timestamp_now(),
            updated: None,
        }
    }

    /// Last path component of `name`
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub(crate) fn check(&self) -> MetastoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(MetastoreError::invalid_record("name cannot be empty"));
        }
        if self.md5.trim().is_empty() {
            return Err(MetastoreError::invalid_record(format!(
                "{} has no md5",
                self.name
            )));
        }
        Ok(())
    }
}

/// Updatable columns of the `file` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileField {
    /// Absolute path
    Name,
    /// Content hash
    Md5,
    /// Size in bytes
    Size,
    /// Classification tag
    Type,
    /// Withdrawn flag (`0` / `1`)
    Withdrawn,
    /// Last update time
    Updated,
}

impl FileField {
    /// Column name in the `file` table
    pub fn column(&self) -> &'static str {
        match self {
            FileField::Name => "name",
            FileField::Md5 => "md5",
            FileField::Size => "size",
            FileField::Type => "type",
            FileField::Withdrawn => "withdrawn",
            FileField::Updated => "updated",
        }
    }

    /// Apply `value` to the matching field of `record`
    pub(crate) fn apply(&self, record: &mut FileRecord, value: &str) -> MetastoreResult<()> {
        match self {
            FileField::Name => record.name = value.to_string(),
            FileField::Md5 => record.md5 = value.to_string(),
            FileField::Size => {
                record.size = value.parse().map_err(|_| {
                    MetastoreError::invalid_record(format!("size must be an integer, got '{}'", value))
                })?
            }
            FileField::Type => record.file_type = value.to_string(),
            FileField::Withdrawn => {
                record.withdrawn = match value {
                    "1" | "true" => true,
                    "0" | "false" => false,
                    _ => {
                        return Err(MetastoreError::invalid_record(format!(
                            "withdrawn must be 0 or 1, got '{}'",
                            value
                        )))
                    }
                }
            }
            FileField::Updated => record.updated = Some(value.to_string()),
        }
        Ok(())
    }
}

impl fmt::Display for FileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Operations the reconciler needs from the metadata store.
#[async_trait]
pub trait MetadataStore: Send + Sync + fmt::Debug {
    /// Row whose name is exactly `path`
    async fn fetch_row(&self, path: &str) -> MetastoreResult<Option<FileRecord>>;

    /// First row (by name) whose last path component is `basename`
    async fn fetch_by_basename(&self, basename: &str) -> MetastoreResult<Option<FileRecord>>;

    /// Insert a new row, returning its id (`None` on a dry run)
    async fn insert_row(&self, record: &FileRecord, dry_run: bool) -> MetastoreResult<Option<i64>>;

    /// Set `field` to `value` on the row named `match_path`, bumping `updated`.
    ///
    /// Returns the number of rows changed; zero when no row matches or on a
    /// dry run.
    async fn update_field(
        &self,
        field: FileField,
        value: &str,
        match_path: &str,
        dry_run: bool,
    ) -> MetastoreResult<usize>;

    /// Delete the row named `record.name`
    async fn delete_row(&self, record: &FileRecord, dry_run: bool) -> MetastoreResult<usize>;

    /// Current (not withdrawn) rows ordered by name, at most `limit`
    async fn list_rows(&self, limit: Option<usize>) -> MetastoreResult<Vec<FileRecord>>;
}
