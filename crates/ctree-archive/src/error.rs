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

//! Remote store error types

use std::io;
use thiserror::Error;

/// Result type alias for remote store operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised by the remote object store.
///
/// A missing object is not an error: lookups return `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Transport failure (connection refused, timeout, TLS)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status other than 404
    #[error("{method} {url} failed with status {status}: {body}")]
    Status {
        /// HTTP method of the failed request
        method: String,
        /// Requested URL
        url: String,
        /// Response status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The store answered with a body that could not be decoded
    #[error("invalid response from remote store: {0}")]
    InvalidResponse(String),

    /// Local I/O error while reading an upload or writing a download
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Remote path rejected before any request was made
    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    /// Store misconfigured or refused the operation
    #[error("remote store error: {0}")]
    Backend(String),
}

impl ArchiveError {
    /// Create an InvalidResponse error with context
    pub fn invalid_response<S: Into<String>>(msg: S) -> Self {
        ArchiveError::InvalidResponse(msg.into())
    }

    /// Create an InvalidPath error with context
    pub fn invalid_path<S: Into<String>>(msg: S) -> Self {
        ArchiveError::InvalidPath(msg.into())
    }

    /// Create a Backend error with context
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        ArchiveError::Backend(msg.into())
    }

    /// Status code of a [`ArchiveError::Status`] error
    pub fn status(&self) -> Option<u16> {
        match self {
            ArchiveError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 401/403 answers
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ArchiveError::Status {
            method: "DELETE".to_string(),
            url: "http://fire/v1.1/objects/abc".to_string(),
            status: 503,
            body: "Service Unavailable".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_unauthorized());
        assert_eq!(
            err.to_string(),
            "DELETE http://fire/v1.1/objects/abc failed with status 503: Service Unavailable"
        );
    }

    #[test]
    fn test_unauthorized() {
        let err = ArchiveError::Status {
            method: "GET".to_string(),
            url: "u".to_string(),
            status: 401,
            body: String::new(),
        };
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_io_error_conversion() {
        let err = ArchiveError::from(io::Error::other("disk full"));
        assert!(matches!(err, ArchiveError::Io(_)));
        assert_eq!(err.status(), None);
    }
}
