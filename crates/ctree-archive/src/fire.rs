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

//! REST client for the FIRE object store
//!
//! Every endpoint lives under `{endpoint}/{version}/objects`:
//!
//! | Operation | Request |
//! |---|---|
//! | metadata by path | `GET objects/path/{path}` |
//! | metadata by id | `GET objects/{oid}` |
//! | download | `GET objects/blob/path/{path}` |
//! | upload | `POST objects` (multipart, `x-fire-md5` / `x-fire-size`) |
//! | set path | `PUT objects/{oid}/firePath` (`x-fire-path`) |
//! | publish | `PUT objects/{oid}/publish` |
//! | delete | `DELETE objects/{oid}` |
//!
//! All requests use basic auth. A 404 answer maps to `None`.

use crate::{check_remote_path, ArchiveError, ArchiveResult, ArchiveStore, ArchivedObject, UploadRequest};
use async_trait::async_trait;
use ctree_config::RemoteConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const MAX_ERROR_BODY: usize = 512;

/// Object metadata as returned by the store.
///
/// Path and publication state are nested under `filesystemEntry`, which is
/// null for objects without a virtual path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FireObjectResponse {
    object_id: i64,
    fire_oid: String,
    #[serde(alias = "md5")]
    object_md5: String,
    #[serde(alias = "size")]
    object_size: u64,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    filesystem_entry: Option<FilesystemEntry>,
}

#[derive(Debug, Deserialize)]
struct FilesystemEntry {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    published: bool,
}

impl From<FireObjectResponse> for ArchivedObject {
    fn from(raw: FireObjectResponse) -> Self {
        let (path, published) = match raw.filesystem_entry {
            Some(entry) => (entry.path, entry.published),
            None => (None, false),
        };
        ArchivedObject {
            object_id: raw.object_id,
            fire_oid: raw.fire_oid,
            md5: raw.object_md5,
            size: raw.object_size,
            created: raw.create_time.unwrap_or_default(),
            path,
            published,
        }
    }
}

/// [`ArchiveStore`] over the FIRE REST API.
#[derive(Clone)]
pub struct FireClient {
    client: reqwest::Client,
    objects_url: String,
    user: String,
    password: Option<String>,
}

impl fmt::Debug for FireClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FireClient")
            .field("objects_url", &self.objects_url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl FireClient {
    /// Build a client from the `[remote]` configuration section
    pub fn new(config: &RemoteConfig) -> ArchiveResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(FireClient {
            client,
            objects_url: config.objects_url(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    /// Base URL of the objects API
    pub fn objects_url(&self) -> &str {
        &self.objects_url
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}", self.objects_url, suffix.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.user, self.password.as_ref())
    }

    /// Map 404 to `None` and any other non-success status to an error
    async fn check(method: &Method, url: &str, response: Response) -> ArchiveResult<Option<Response>> {
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        if status == StatusCode::NOT_FOUND {
            debug!(%method, url, "Remote object not found");
            return Ok(None);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(ArchiveError::Status {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn send_for_object(
        &self,
        method: Method,
        url: String,
        builder: reqwest::RequestBuilder,
    ) -> ArchiveResult<Option<ArchivedObject>> {
        let response = builder.send().await?;
        match Self::check(&method, &url, response).await? {
            Some(response) => {
                let raw: FireObjectResponse = response.json().await.map_err(|e| {
                    ArchiveError::invalid_response(format!("{} {}: {}", method, url, e))
                })?;
                Ok(Some(raw.into()))
            }
            None => Ok(None),
        }
    }

    async fn publish(&self, fire_oid: &str) -> ArchiveResult<Option<ArchivedObject>> {
        let url = self.url(&format!("{}/publish", fire_oid));
        debug!(fire_oid, "PUT {}", url);
        let builder = self.request(Method::PUT, &url);
        self.send_for_object(Method::PUT, url, builder).await
    }

    async fn set_path(&self, fire_oid: &str, new_path: &str) -> ArchiveResult<Option<ArchivedObject>> {
        let url = self.url(&format!("{}/firePath", fire_oid));
        debug!(fire_oid, new_path, "PUT {}", url);
        let builder = self
            .request(Method::PUT, &url)
            .header("x-fire-path", new_path);
        self.send_for_object(Method::PUT, url, builder).await
    }
}

#[async_trait]
impl ArchiveStore for FireClient {
    async fn fetch_metadata(&self, path: &str) -> ArchiveResult<Option<ArchivedObject>> {
        let path = check_remote_path(path)?;
        let url = self.url(&format!("path/{}", path));
        debug!(path, "GET {}", url);
        let builder = self.request(Method::GET, &url);
        self.send_for_object(Method::GET, url, builder).await
    }

    async fn fetch_by_id(&self, fire_oid: &str) -> ArchiveResult<Option<ArchivedObject>> {
        let url = self.url(fire_oid);
        debug!(fire_oid, "GET {}", url);
        let builder = self.request(Method::GET, &url);
        self.send_for_object(Method::GET, url, builder).await
    }

    async fn download(&self, path: &str, dest: &Path) -> ArchiveResult<Option<PathBuf>> {
        let path = check_remote_path(path)?;
        let url = self.url(&format!("blob/path/{}", path));
        debug!(path, dest = %dest.display(), "GET {}", url);

        let response = self.request(Method::GET, &url).send().await?;
        let Some(mut response) = Self::check(&Method::GET, &url, response).await? else {
            return Ok(None);
        };

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;

        info!(path, dest = %dest.display(), bytes = written, "Downloaded remote object");
        Ok(Some(dest.to_path_buf()))
    }

    async fn upload(
        &self,
        request: &UploadRequest,
        dry_run: bool,
    ) -> ArchiveResult<Option<ArchivedObject>> {
        let remote_path = check_remote_path(&request.remote_path)?;
        let url = self.objects_url.clone();

        if dry_run {
            info!(
                dry_run = true,
                local = %request.local_path.display(),
                remote_path,
                md5 = %request.md5,
                size = request.size,
                "Would upload {} to {}",
                request.local_path.display(),
                url
            );
            return Ok(None);
        }

        let content = tokio::fs::read(&request.local_path).await?;
        let file_name = request
            .local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = Form::new().part("file", Part::bytes(content).file_name(file_name));

        debug!(local = %request.local_path.display(), "POST {}", url);
        let builder = self
            .request(Method::POST, &url)
            .header("x-fire-md5", &request.md5)
            .header("x-fire-size", request.size.to_string())
            .multipart(form);
        let created = self
            .send_for_object(Method::POST, url.clone(), builder)
            .await?
            .ok_or_else(|| ArchiveError::backend(format!("POST {} returned 404", url)))?;
        info!(fire_oid = %created.fire_oid, local = %request.local_path.display(), "Object pushed");

        let mut object = self
            .set_path(&created.fire_oid, remote_path)
            .await?
            .ok_or_else(|| {
                ArchiveError::backend(format!(
                    "object {} vanished before its path could be set",
                    created.fire_oid
                ))
            })?;

        if request.publish {
            object = self.publish(&created.fire_oid).await?.ok_or_else(|| {
                ArchiveError::backend(format!(
                    "object {} vanished before it could be published",
                    created.fire_oid
                ))
            })?;
        }

        info!(fire_oid = %object.fire_oid, remote_path, published = object.published, "Upload complete");
        Ok(Some(object))
    }

    async fn update_path(
        &self,
        fire_oid: &str,
        new_path: &str,
        dry_run: bool,
    ) -> ArchiveResult<Option<ArchivedObject>> {
        let new_path = check_remote_path(new_path)?;
        if dry_run {
            info!(dry_run = true, fire_oid, new_path, "Would set path of {} to {}", fire_oid, new_path);
            return Ok(None);
        }
        self.set_path(fire_oid, new_path).await
    }

    async fn delete(&self, fire_oid: &str, dry_run: bool) -> ArchiveResult<()> {
        let url = self.url(fire_oid);
        if dry_run {
            info!(dry_run = true, fire_oid, "Would DELETE {}", url);
            return Ok(());
        }

        debug!(fire_oid, "DELETE {}", url);
        let response = self.request(Method::DELETE, &url).send().await?;
        match Self::check(&Method::DELETE, &url, response).await? {
            Some(_) => info!(fire_oid, "Remote object deleted"),
            None => warn!(fire_oid, "Remote object already absent"),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_with_filesystem_entry() {
        let json = r#"{
            "objectId": 42,
            "fireOid": "8a3f0c",
            "objectMd5": "d41d8cd98f00b204e9800998ecf8427e",
            "objectSize": 0,
            "createTime": "2020-02-17 16:44:55",
            "metadata": [],
            "filesystemEntry": {"path": "ftp/current.tree", "published": true}
        }"#;
        let raw: FireObjectResponse = serde_json::from_str(json).unwrap();
        let object = ArchivedObject::from(raw);

        assert_eq!(object.object_id, 42);
        assert_eq!(object.fire_oid, "8a3f0c");
        assert_eq!(object.size, 0);
        assert_eq!(object.path.as_deref(), Some("ftp/current.tree"));
        assert!(object.published);
    }

    #[test]
    fn test_parse_object_without_path() {
        let json = r#"{
            "objectId": 7,
            "fireOid": "b1",
            "md5": "abc",
            "size": 12,
            "filesystemEntry": null
        }"#;
        let object = ArchivedObject::from(serde_json::from_str::<FireObjectResponse>(json).unwrap());
        assert_eq!(object.md5, "abc");
        assert!(object.path.is_none());
        assert!(!object.published);
        assert_eq!(object.created, "");
    }

    #[test]
    fn test_urls_and_debug() {
        let config = RemoteConfig {
            endpoint: "http://fire.local/fire/".to_string(),
            password: Some("s3cret".to_string()),
            ..RemoteConfig::default()
        };
        let client = FireClient::new(&config).unwrap();
        assert_eq!(client.objects_url(), "http://fire.local/fire/v1.1/objects");
        assert_eq!(
            client.url("path/ftp/CHANGELOG"),
            "http://fire.local/fire/v1.1/objects/path/ftp/CHANGELOG"
        );
        assert!(!format!("{:?}", client).contains("s3cret"));
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_request() {
        // Nothing listens on this port; a real request would fail.
        let config = RemoteConfig {
            endpoint: "http://127.0.0.1:9/fire".to_string(),
            ..RemoteConfig::default()
        };
        let client = FireClient::new(&config).unwrap();
        let request = UploadRequest::new("/nonexistent", "ftp/CHANGELOG", "abc", 1);

        assert!(client.upload(&request, true).await.unwrap().is_none());
        assert!(client.update_path("oid", "ftp/x", true).await.unwrap().is_none());
        assert!(client.delete("oid", true).await.is_ok());
    }
}
