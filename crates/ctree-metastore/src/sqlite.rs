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

//! SQLite-backed metadata store.

use crate::{timestamp_now, FileField, FileRecord, MetadataStore, MetastoreError, MetastoreResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS file (
        file_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        md5 TEXT NOT NULL,
        type TEXT NOT NULL,
        size INTEGER NOT NULL,
        host_id INTEGER NOT NULL DEFAULT 1,
        withdrawn INTEGER NOT NULL DEFAULT 0,
        created TEXT NOT NULL,
        updated TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_file_withdrawn_name ON file (withdrawn, name);";

const SELECT_COLUMNS: &str =
    "SELECT file_id, name, md5, type, size, host_id, withdrawn, created, updated FROM file";

/// [`MetadataStore`] over a SQLite `file` table.
///
/// The connection is shared behind a mutex and every query runs on tokio's
/// blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema
    pub fn open(path: impl AsRef<Path>) -> MetastoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| MetastoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let connection = Connection::open(path)?;
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        connection.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "Opened metadata store");

        Ok(SqliteStore {
            connection: Arc::new(Mutex::new(connection)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, mainly for tests
    pub fn open_in_memory() -> MetastoreResult<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch(SCHEMA)?;
        Ok(SqliteStore {
            connection: Arc::new(Mutex::new(connection)),
            path: None,
        })
    }

    /// Database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn with_conn<F, T>(&self, f: F) -> MetastoreResult<T>
    where
        F: FnOnce(&Connection) -> MetastoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let guard = connection.lock().map_err(|_| MetastoreError::Poisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| MetastoreError::Worker(e.to_string()))?
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        file_id: row.get(0)?,
        name: row.get(1)?,
        md5: row.get(2)?,
        file_type: row.get(3)?,
        size: row.get::<_, i64>(4)?.max(0) as u64,
        host_id: row.get(5)?,
        withdrawn: row.get::<_, i64>(6)? != 0,
        created: row.get(7)?,
        updated: row.get(8)?,
    })
}

fn map_insert_error(err: rusqlite::Error, name: &str) -> MetastoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            MetastoreError::Duplicate(name.to_string())
        }
        _ => MetastoreError::Sql(err),
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn fetch_row(&self, path: &str) -> MetastoreResult<Option<FileRecord>> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            let sql = format!("{} WHERE name = ?1", SELECT_COLUMNS);
            let record = conn
                .query_row(&sql, params![path], map_row)
                .optional()?;
            if record.is_none() {
                debug!(path = %path, "No row in metadata store");
            }
            Ok(record)
        })
        .await
    }

    async fn fetch_by_basename(&self, basename: &str) -> MetastoreResult<Option<FileRecord>> {
        let basename = basename.to_string();
        self.with_conn(move |conn| {
            // substr() rather than LIKE: basenames routinely contain '_'.
            let sql = format!(
                "{} WHERE name = ?1 OR substr(name, -length(?2)) = ?2 ORDER BY name LIMIT 1",
                SELECT_COLUMNS
            );
            let suffix = format!("/{}", basename);
            Ok(conn
                .query_row(&sql, params![basename, suffix], map_row)
                .optional()?)
        })
        .await
    }

    async fn insert_row(&self, record: &FileRecord, dry_run: bool) -> MetastoreResult<Option<i64>> {
        record.check()?;
        if dry_run {
            info!(
                dry_run = true,
                name = %record.name,
                md5 = %record.md5,
                size = record.size,
                file_type = %record.file_type,
                "Would insert metadata row"
            );
            return Ok(None);
        }

        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO file (name, md5, type, size, host_id, withdrawn, created, updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.name,
                    record.md5,
                    record.file_type,
                    record.size as i64,
                    record.host_id,
                    record.withdrawn as i64,
                    record.created,
                    record.updated,
                ],
            )
            .map_err(|e| map_insert_error(e, &record.name))?;
            let id = conn.last_insert_rowid();
            info!(name = %record.name, file_id = id, "Metadata row inserted");
            Ok(Some(id))
        })
        .await
    }

    async fn update_field(
        &self,
        field: FileField,
        value: &str,
        match_path: &str,
        dry_run: bool,
    ) -> MetastoreResult<usize> {
        // Validate the value the same way the in-memory store does.
        let mut candidate = FileRecord::new(match_path, "-", 0, "-");
        field.apply(&mut candidate, value)?;

        let now = timestamp_now();
        if dry_run {
            info!(
                dry_run = true,
                field = %field,
                value,
                name = match_path,
                updated = %now,
                "Would update metadata row"
            );
            return Ok(0);
        }

        let value = value.to_string();
        let match_path = match_path.to_string();
        self.with_conn(move |conn| {
            let changed = (if field == FileField::Updated {
                conn.execute(
                    "UPDATE file SET updated = ?1 WHERE name = ?2",
                    params![value, match_path],
                )
            } else {
                let sql = format!(
                    "UPDATE file SET {} = ?1, updated = ?2 WHERE name = ?3",
                    field.column()
                );
                conn.execute(&sql, params![value, now, match_path])
            })
            .map_err(|e| map_insert_error(e, &value))?;
            info!(field = %field, name = %match_path, changed, "Metadata row updated");
            Ok(changed)
        })
        .await
    }

    async fn delete_row(&self, record: &FileRecord, dry_run: bool) -> MetastoreResult<usize> {
        if dry_run {
            info!(dry_run = true, name = %record.name, "Would delete metadata row");
            return Ok(0);
        }
        let name = record.name.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM file WHERE name = ?1", params![name])?;
            info!(name = %name, changed, "Metadata row deleted");
            Ok(changed)
        })
        .await
    }

    async fn list_rows(&self, limit: Option<usize>) -> MetastoreResult<Vec<FileRecord>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit: i64 = limit.map(|l| l as i64).unwrap_or(-1);
        self.with_conn(move |conn| {
            let sql = format!(
                "{} WHERE withdrawn = 0 ORDER BY name ASC LIMIT ?1",
                SELECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit], map_row)?
                .collect::<Result<Vec<_>, _>>()?;
            debug!(rows = rows.len(), "Listed metadata rows");
            Ok(rows)
        })
        .await
    }
}
