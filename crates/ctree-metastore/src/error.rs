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

//! Metadata store error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for metadata store operations
pub type MetastoreResult<T> = Result<T, MetastoreError>;

/// Errors returned by a metadata store.
///
/// An absent row is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum MetastoreError {
    /// SQLite query failed
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Failed to create the directory holding the database file
    #[error("Could not create {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A record failed validation before it reached the store
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A row with the same name already exists
    #[error("A row named {0} already exists")]
    Duplicate(String),

    /// The connection lock was poisoned by a panicking thread
    #[error("Database connection is unusable after a panic")]
    Poisoned,

    /// The blocking worker running the query was cancelled or panicked
    #[error("Database worker failed: {0}")]
    Worker(String),
}

impl MetastoreError {
    /// Create an InvalidRecord error with context
    pub fn invalid_record<S: Into<String>>(msg: S) -> Self {
        MetastoreError::InvalidRecord(msg.into())
    }

    /// True for a uniqueness violation on the row name
    pub fn is_duplicate(&self) -> bool {
        matches!(self, MetastoreError::Duplicate(_))
    }
}
