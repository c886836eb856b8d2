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

//! In-memory metadata store for testing
//!
//! Rows live in a `BTreeMap` keyed by name behind an `Arc<RwLock<..>>`.
//! Every applied mutation is recorded in a journal so tests can check which
//! writes a workflow performed.

use crate::{timestamp_now, FileField, FileRecord, MetadataStore, MetastoreError, MetastoreResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// A mutation applied to a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A row was inserted
    Insert {
        /// Row name
        name: String,
    },
    /// A column was updated
    Update {
        /// Updated column
        field: FileField,
        /// New value
        value: String,
        /// Row name before the update
        name: String,
    },
    /// A row was deleted
    Delete {
        /// Row name
        name: String,
    },
}

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<String, FileRecord>,
    journal: Vec<StoreOp>,
    next_id: i64,
    fail_queries: bool,
}

impl MemoryState {
    fn check_queries(&self) -> MetastoreResult<()> {
        if self.fail_queries {
            return Err(MetastoreError::Worker("injected query failure".to_string()));
        }
        Ok(())
    }
}

/// In-memory [`MetadataStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows without recording journal entries
    pub async fn seed<I>(&self, records: I)
    where
        I: IntoIterator<Item = FileRecord>,
    {
        let mut state = self.state.write().await;
        for mut record in records {
            state.next_id += 1;
            record.file_id = Some(state.next_id);
            state.rows.insert(record.name.clone(), record);
        }
    }

    /// Make every read query fail, or stop doing so
    pub async fn fail_queries(&self, fail: bool) {
        self.state.write().await.fail_queries = fail;
    }

    /// Mutations applied so far, oldest first
    pub async fn journal(&self) -> Vec<StoreOp> {
        self.state.read().await.journal.clone()
    }

    /// Every row, withdrawn included, ordered by name
    pub async fn rows(&self) -> Vec<FileRecord> {
        self.state.read().await.rows.values().cloned().collect()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn fetch_row(&self, path: &str) -> MetastoreResult<Option<FileRecord>> {
        let state = self.state.read().await;
        state.check_queries()?;
        Ok(state.rows.get(path).cloned())
    }

    async fn fetch_by_basename(&self, basename: &str) -> MetastoreResult<Option<FileRecord>> {
        let suffix = format!("/{}", basename);
        let state = self.state.read().await;
        state.check_queries()?;
        Ok(state
            .rows
            .values()
            .find(|r| r.name == basename || r.name.ends_with(&suffix))
            .cloned())
    }

    async fn insert_row(&self, record: &FileRecord, dry_run: bool) -> MetastoreResult<Option<i64>> {
        record.check()?;
        if dry_run {
            info!(dry_run = true, name = %record.name, "Would insert metadata row");
            return Ok(None);
        }

        let mut state = self.state.write().await;
        if state.rows.contains_key(&record.name) {
            return Err(MetastoreError::Duplicate(record.name.clone()));
        }
        state.next_id += 1;
        let id = state.next_id;
        let mut stored = record.clone();
        stored.file_id = Some(id);
        state.rows.insert(stored.name.clone(), stored);
        state.journal.push(StoreOp::Insert {
            name: record.name.clone(),
        });
        Ok(Some(id))
    }

    async fn update_field(
        &self,
        field: FileField,
        value: &str,
        match_path: &str,
        dry_run: bool,
    ) -> MetastoreResult<usize> {
        let mut state = self.state.write().await;
        let Some(mut record) = state.rows.get(match_path).cloned() else {
            field.apply(&mut FileRecord::new(match_path, "-", 0, "-"), value)?;
            return Ok(0);
        };
        field.apply(&mut record, value)?;
        if field != FileField::Updated {
            record.updated = Some(timestamp_now());
        }

        if dry_run {
            info!(dry_run = true, field = %field, value, name = match_path, "Would update metadata row");
            return Ok(0);
        }

        if field == FileField::Name && value != match_path && state.rows.contains_key(value) {
            return Err(MetastoreError::Duplicate(value.to_string()));
        }
        state.rows.remove(match_path);
        state.rows.insert(record.name.clone(), record);
        state.journal.push(StoreOp::Update {
            field,
            value: value.to_string(),
            name: match_path.to_string(),
        });
        Ok(1)
    }

    async fn delete_row(&self, record: &FileRecord, dry_run: bool) -> MetastoreResult<usize> {
        if dry_run {
            info!(dry_run = true, name = %record.name, "Would delete metadata row");
            return Ok(0);
        }
        let mut state = self.state.write().await;
        if state.rows.remove(&record.name).is_none() {
            return Ok(0);
        }
        state.journal.push(StoreOp::Delete {
            name: record.name.clone(),
        });
        Ok(1)
    }

    async fn list_rows(&self, limit: Option<usize>) -> MetastoreResult<Vec<FileRecord>> {
        let state = self.state.read().await;
        state.check_queries()?;
        let rows = state.rows.values().filter(|r| !r.withdrawn).cloned();
        Ok(match limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rename_moves_key() {
        let store = MemoryStore::new();
        store
            .seed([FileRecord::new("/scratch/changelog_details_20210304_new", "a", 1, "CHANGELOG")])
            .await;

        let changed = store
            .update_field(
                FileField::Name,
                "/nfs/vol1/ftp/changelog_details/changelog_details_20210304_new",
                "/scratch/changelog_details_20210304_new",
                false,
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert!(store
            .fetch_row("/scratch/changelog_details_20210304_new")
            .await
            .unwrap()
            .is_none());

        let moved = store
            .fetch_by_basename("changelog_details_20210304_new")
            .await
            .unwrap()
            .unwrap();
        assert!(moved.name.starts_with("/nfs/vol1/ftp/"));
        assert!(moved.updated.is_some());
        assert_eq!(store.journal().await.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_query_failure() {
        let store = MemoryStore::new();
        store.seed([FileRecord::new("/x/a", "abc", 1, "T")]).await;

        store.fail_queries(true).await;
        assert!(store.list_rows(None).await.is_err());
        assert!(store.fetch_row("/x/a").await.is_err());

        store.fail_queries(false).await;
        assert_eq!(store.list_rows(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_rows() {
        let store = MemoryStore::new();
        let record = FileRecord::new("/x/a", "abc", 1, "T");
        store.seed([record.clone()]).await;
        let before = store.rows().await;

        store.update_field(FileField::Md5, "zzz", "/x/a", true).await.unwrap();
        store.delete_row(&record, true).await.unwrap();
        store
            .insert_row(&FileRecord::new("/x/b", "abc", 1, "T"), true)
            .await
            .unwrap();

        assert_eq!(store.rows().await, before);
        assert!(store.journal().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let store = MemoryStore::new();
        assert_eq!(
            store.update_field(FileField::Md5, "x", "/nope", false).await.unwrap(),
            0
        );
        assert!(store
            .update_field(FileField::Size, "lots", "/nope", false)
            .await
            .is_err());
    }
}
