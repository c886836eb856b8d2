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

//! In-memory remote store for testing
//!
//! Objects live in an `Arc<RwLock<..>>` keyed by object id. Every mutating
//! call that is not a dry run is appended to a journal, so tests can assert
//! exactly which mutations a workflow performed (or that none happened).
//!
//! ```rust,no_run
//! use ctree_archive::{ArchiveStore, MockArchive};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ctree_archive::ArchiveError> {
//! let archive = MockArchive::new();
//! let seeded = archive.seed("ftp/CHANGELOG", b"2020-01-01\n").await;
//!
//! archive.delete(&seeded.fire_oid, true).await?;
//! assert!(archive.journal().await.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::{check_remote_path, ArchiveError, ArchiveResult, ArchiveStore, ArchivedObject, UploadRequest};
use async_trait::async_trait;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A mutation applied to a [`MockArchive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOp {
    /// An object was uploaded under `remote_path`
    Upload {
        /// Virtual path assigned to the new object
        remote_path: String,
        /// MD5 announced by the uploader
        md5: String,
    },
    /// An object's virtual path was changed
    UpdatePath {
        /// Object id
        fire_oid: String,
        /// New virtual path
        new_path: String,
    },
    /// An object was deleted
    Delete {
        /// Object id
        fire_oid: String,
    },
}

/// Which operation a [`MockArchive`] should refuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// Fail uploads whose remote path ends with the given suffix
    Upload(&'static str),
    /// Fail every delete
    Delete,
}

#[derive(Debug, Clone)]
struct StoredObject {
    meta: ArchivedObject,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    objects: BTreeMap<String, StoredObject>,
    journal: Vec<ArchiveOp>,
    next_id: i64,
    fail_on: Option<FailOn>,
}

impl MockState {
    fn by_path(&self, path: &str) -> Option<&StoredObject> {
        self.objects
            .values()
            .find(|o| o.meta.path.as_deref() == Some(path))
    }

    fn insert(&mut self, path: &str, content: Vec<u8>, md5: String, published: bool) -> ArchivedObject {
        self.next_id += 1;
        let meta = ArchivedObject {
            object_id: self.next_id,
            fire_oid: format!("{:032x}", self.next_id),
            md5,
            size: content.len() as u64,
            created: "2020-01-01 00:00:00".to_string(),
            path: Some(path.to_string()),
            published,
        };
        self.objects.insert(
            meta.fire_oid.clone(),
            StoredObject {
                meta: meta.clone(),
                content,
            },
        );
        meta
    }
}

/// In-memory [`ArchiveStore`]
#[derive(Debug, Clone, Default)]
pub struct MockArchive {
    state: Arc<RwLock<MockState>>,
}

impl MockArchive {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a published object at `path` without recording a journal entry
    pub async fn seed(&self, path: &str, content: &[u8]) -> ArchivedObject {
        let md5 = hex::encode(Md5::digest(content));
        self.state
            .write()
            .await
            .insert(path, content.to_vec(), md5, true)
    }

    /// Make the given operation fail with a backend error
    pub async fn fail_on(&self, fail: FailOn) {
        self.state.write().await.fail_on = Some(fail);
    }

    /// Stop injecting failures
    pub async fn clear_failures(&self) {
        self.state.write().await.fail_on = None;
    }

    /// Mutations applied so far, oldest first
    pub async fn journal(&self) -> Vec<ArchiveOp> {
        self.state.read().await.journal.clone()
    }

    /// Content of the object at `path`
    pub async fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .await
            .by_path(path)
            .map(|o| o.content.clone())
    }

    /// All objects, ordered by id
    pub async fn objects(&self) -> Vec<ArchivedObject> {
        let state = self.state.read().await;
        let mut objects: Vec<ArchivedObject> =
            state.objects.values().map(|o| o.meta.clone()).collect();
        objects.sort_by_key(|o| o.object_id);
        objects
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.state.read().await.objects.len()
    }

    /// True when nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ArchiveStore for MockArchive {
    async fn fetch_metadata(&self, path: &str) -> ArchiveResult<Option<ArchivedObject>> {
        let path = check_remote_path(path)?;
        Ok(self.state.read().await.by_path(path).map(|o| o.meta.clone()))
    }

    async fn fetch_by_id(&self, fire_oid: &str) -> ArchiveResult<Option<ArchivedObject>> {
        Ok(self
            .state
            .read()
            .await
            .objects
            .get(fire_oid)
            .map(|o| o.meta.clone()))
    }

    async fn download(&self, path: &str, dest: &Path) -> ArchiveResult<Option<PathBuf>> {
        let path = check_remote_path(path)?;
        let content = match self.state.read().await.by_path(path) {
            Some(object) => object.content.clone(),
            None => return Ok(None),
        };
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(dest, &content).await?;
        debug!(path, dest = %dest.display(), "Mock download");
        Ok(Some(dest.to_path_buf()))
    }

    async fn upload(
        &self,
        request: &UploadRequest,
        dry_run: bool,
    ) -> ArchiveResult<Option<ArchivedObject>> {
        let remote_path = check_remote_path(&request.remote_path)?;
        if dry_run {
            info!(dry_run = true, remote_path, "Would upload {}", request.local_path.display());
            return Ok(None);
        }

        let content = tokio::fs::read(&request.local_path).await?;
        let mut state = self.state.write().await;
        if let Some(FailOn::Upload(suffix)) = state.fail_on {
            if remote_path.ends_with(suffix) {
                return Err(ArchiveError::backend(format!(
                    "injected upload failure for {}",
                    remote_path
                )));
            }
        }
        if state.by_path(remote_path).is_some() {
            return Err(ArchiveError::backend(format!(
                "path {} is already taken",
                remote_path
            )));
        }

        let meta = state.insert(remote_path, content, request.md5.clone(), request.publish);
        state.journal.push(ArchiveOp::Upload {
            remote_path: remote_path.to_string(),
            md5: request.md5.clone(),
        });
        Ok(Some(meta))
    }

    async fn update_path(
        &self,
        fire_oid: &str,
        new_path: &str,
        dry_run: bool,
    ) -> ArchiveResult<Option<ArchivedObject>> {
        let new_path = check_remote_path(new_path)?;
        if dry_run {
            info!(dry_run = true, fire_oid, new_path, "Would set object path");
            return Ok(None);
        }

        let mut state = self.state.write().await;
        let Some(object) = state.objects.get_mut(fire_oid) else {
            return Ok(None);
        };
        object.meta.path = Some(new_path.to_string());
        let meta = object.meta.clone();
        state.journal.push(ArchiveOp::UpdatePath {
            fire_oid: fire_oid.to_string(),
            new_path: new_path.to_string(),
        });
        Ok(Some(meta))
    }

    async fn delete(&self, fire_oid: &str, dry_run: bool) -> ArchiveResult<()> {
        if dry_run {
            info!(dry_run = true, fire_oid, "Would delete object");
            return Ok(());
        }

        let mut state = self.state.write().await;
        if state.fail_on == Some(FailOn::Delete) {
            return Err(ArchiveError::backend(format!(
                "injected delete failure for {}",
                fire_oid
            )));
        }
        state.objects.remove(fire_oid);
        state.journal.push(ArchiveOp::Delete {
            fire_oid: fire_oid.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_seed_and_fetch() {
        let archive = MockArchive::new();
        let seeded = archive.seed("ftp/current.tree", b"hello").await;

        assert_eq!(seeded.md5, "5d41402abc4b2a76b9719d911017c592");
        let fetched = archive.fetch_metadata("ftp/current.tree").await.unwrap().unwrap();
        assert_eq!(fetched, seeded);
        assert_eq!(
            archive.fetch_by_id(&seeded.fire_oid).await.unwrap().unwrap().path.as_deref(),
            Some("ftp/current.tree")
        );
        assert!(archive.journal().await.is_empty());
    }

    #[tokio::test]
    async fn test_upload_replace_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("CHANGELOG");
        tokio::fs::write(&local, b"new content").await.unwrap();

        let archive = MockArchive::new();
        let old = archive.seed("ftp/CHANGELOG", b"old content").await;

        // Path is taken until the old object is gone.
        let request = UploadRequest::new(&local, "ftp/CHANGELOG", "md5", 11);
        assert!(archive.upload(&request, false).await.is_err());

        archive.delete(&old.fire_oid, false).await.unwrap();
        let new = archive.upload(&request, false).await.unwrap().unwrap();
        assert!(new.published);
        assert_eq!(archive.content("ftp/CHANGELOG").await.unwrap(), b"new content");

        assert_eq!(
            archive.journal().await,
            vec![
                ArchiveOp::Delete { fire_oid: old.fire_oid.clone() },
                ArchiveOp::Upload {
                    remote_path: "ftp/CHANGELOG".to_string(),
                    md5: "md5".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_dry_run_is_not_journaled() {
        let archive = MockArchive::new();
        let seeded = archive.seed("ftp/a", b"a").await;
        let request = UploadRequest::new("/does/not/exist", "ftp/b", "x", 1);

        assert!(archive.upload(&request, true).await.unwrap().is_none());
        assert!(archive.update_path(&seeded.fire_oid, "ftp/c", true).await.unwrap().is_none());
        archive.delete(&seeded.fire_oid, true).await.unwrap();

        assert!(archive.journal().await.is_empty());
        assert_eq!(archive.len().await, 1);
    }

    #[tokio::test]
    async fn test_download_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("x.backup");
        let archive = MockArchive::new();
        assert!(archive.download("ftp/none", &dest).await.unwrap().is_none());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let archive = MockArchive::new();
        let seeded = archive.seed("ftp/a", b"a").await;
        archive.fail_on(FailOn::Delete).await;
        assert!(archive.delete(&seeded.fire_oid, false).await.is_err());
        assert_eq!(archive.len().await, 1);
    }
}
