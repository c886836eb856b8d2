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

//! Remote object store access for ctree
//!
//! The published archive is backed by an object store that addresses every
//! object both by an opaque object id (`fire_oid`) and by a virtual path.
//! The reconciler only needs a handful of operations on it, captured by the
//! [`ArchiveStore`] trait:
//!
//! - [`FireClient`]: the REST implementation, over `reqwest`
//! - [`MockArchive`]: an in-memory implementation with a journal of every
//!   mutating call, used by tests
//!
//! # Not-found versus failure
//!
//! Lookups return `Ok(None)` when the object does not exist. Transport errors
//! and non-success answers other than 404 are `Err`.
//!
//! # Dry run
//!
//! Every mutating method takes a `dry_run` flag. When set, the implementation
//! logs the request it would have made and returns without contacting the
//! store.
//!
//! ```rust,no_run
//! use ctree_archive::{ArchiveStore, MockArchive};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ctree_archive::ArchiveError> {
//!     let archive = MockArchive::new();
//!     archive.seed("ftp/current.tree", b"ftp/a.txt\tfile\t1\t2020-01-01\tabc\n").await;
//!
//!     let object = archive.fetch_metadata("ftp/current.tree").await?;
//!     assert!(object.is_some());
//!     assert!(archive.fetch_metadata("ftp/missing").await?.is_none());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fire;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

pub use error::{ArchiveError, ArchiveResult};
pub use fire::FireClient;
pub use mock::{ArchiveOp, FailOn, MockArchive};

/// Metadata of an object held by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedObject {
    /// Numeric identifier, used for paging
    pub object_id: i64,

    /// Opaque string identifier used by every mutating call
    pub fire_oid: String,

    /// MD5 of the object content (hex)
    pub md5: String,

    /// Size in bytes
    pub size: u64,

    /// Creation time as reported by the store
    pub created: String,

    /// Virtual path, if one has been assigned
    pub path: Option<String>,

    /// Whether the object is exposed through the published tree
    pub published: bool,
}

/// A local file to push to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// File on local disk
    pub local_path: PathBuf,

    /// Virtual path to assign once uploaded
    pub remote_path: String,

    /// MD5 of the file (hex), checked by the store on receipt
    pub md5: String,

    /// Size of the file in bytes
    pub size: u64,

    /// Publish the object once its path is set
    pub publish: bool,
}

impl UploadRequest {
    /// Published upload of `local_path` under `remote_path`
    pub fn new(
        local_path: impl Into<PathBuf>,
        remote_path: impl Into<String>,
        md5: impl Into<String>,
        size: u64,
    ) -> Self {
        UploadRequest {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            md5: md5.into(),
            size,
            publish: true,
        }
    }
}

/// Operations the reconciler needs from the remote object store.
///
/// Implementations must be `Send + Sync + Debug` so a single instance can be
/// shared by the workflow and reported in logs.
#[async_trait]
pub trait ArchiveStore: Send + Sync + Debug {
    /// Metadata of the object published under `path`, if any
    async fn fetch_metadata(&self, path: &str) -> ArchiveResult<Option<ArchivedObject>>;

    /// Metadata of the object with id `fire_oid`, if any
    async fn fetch_by_id(&self, fire_oid: &str) -> ArchiveResult<Option<ArchivedObject>>;

    /// Download the object at `path` into `dest`.
    ///
    /// Returns `Ok(None)` without creating `dest` when no object exists.
    async fn download(&self, path: &str, dest: &Path) -> ArchiveResult<Option<PathBuf>>;

    /// Upload a file, assign its virtual path and optionally publish it.
    ///
    /// A dry run logs the request and returns `Ok(None)`.
    async fn upload(
        &self,
        request: &UploadRequest,
        dry_run: bool,
    ) -> ArchiveResult<Option<ArchivedObject>>;

    /// Change the virtual path of an existing object
    async fn update_path(
        &self,
        fire_oid: &str,
        new_path: &str,
        dry_run: bool,
    ) -> ArchiveResult<Option<ArchivedObject>>;

    /// Delete an object
    async fn delete(&self, fire_oid: &str, dry_run: bool) -> ArchiveResult<()>;
}

/// Reject empty and absolute virtual paths.
pub(crate) fn check_remote_path(path: &str) -> ArchiveResult<&str> {
    if path.trim().is_empty() {
        return Err(ArchiveError::invalid_path("remote path cannot be empty"));
    }
    if path.starts_with('/') {
        return Err(ArchiveError::invalid_path(format!(
            "remote paths are relative, got '{}'",
            path
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_request_defaults_to_publish() {
        let request = UploadRequest::new("/tmp/CHANGELOG", "ftp/CHANGELOG", "abc", 3);
        assert!(request.publish);
        assert_eq!(request.remote_path, "ftp/CHANGELOG");
    }

    #[test]
    fn test_check_remote_path() {
        assert!(check_remote_path("ftp/current.tree").is_ok());
        assert!(check_remote_path("").is_err());
        assert!(check_remote_path("/ftp/current.tree").is_err());
    }
}
