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

//! Digests of local files pushed by the workflow

use crate::error::{ReconcileError, ReconcileResult};
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// A local file with its MD5 and size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Location on disk
    pub path: PathBuf,
    /// MD5 of the content (hex)
    pub md5: String,
    /// Size in bytes
    pub size: u64,
}

impl LocalFile {
    /// Hash `path` in fixed-size chunks
    pub async fn from_path(path: impl AsRef<Path>) -> ReconcileResult<Self> {
        let path = path.as_ref();
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ReconcileError::io(path, e))?;

        let mut hasher = Md5::new();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut size = 0u64;
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| ReconcileError::io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            size += n as u64;
        }

        Ok(LocalFile {
            path: path.to_path_buf(),
            md5: hex::encode(hasher.finalize()),
            size,
        })
    }

    /// Last component of the path
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_digest_matches_known_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("CHANGELOG");
        std::fs::write(&path, b"a").unwrap();

        let file = LocalFile::from_path(&path).await.unwrap();
        assert_eq!(file.md5, "0cc175b9c0f1b6a831c399e269772661");
        assert_eq!(file.size, 1);
        assert_eq!(file.basename(), "CHANGELOG");
    }

    #[tokio::test]
    async fn test_empty_and_large_files() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        let file = LocalFile::from_path(&empty).await.unwrap();
        assert_eq!(file.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(file.size, 0);

        let large = temp_dir.path().join("large");
        let content = vec![7u8; READ_CHUNK * 3 + 11];
        std::fs::write(&large, &content).unwrap();
        let file = LocalFile::from_path(&large).await.unwrap();
        assert_eq!(file.size, content.len() as u64);
        assert_eq!(file.md5, hex::encode(Md5::digest(&content)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        assert!(LocalFile::from_path("/no/such/file").await.is_err());
    }
}
