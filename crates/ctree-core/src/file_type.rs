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

//! File-type tags for change-log entries

use crate::error::{ReconcileError, ReconcileResult};
use ctree_config::FileTypeConfig;
use std::collections::BTreeMap;

/// Extension to type-tag rules.
///
/// The extension is whatever follows the last `.` of the basename, or the
/// whole basename when it has no `.`. Matching ignores case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTypeRules {
    rules: BTreeMap<String, String>,
    fallback: Option<String>,
}

impl FileTypeRules {
    /// Rules with no fallback
    pub fn new<I, K, V>(rules: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        FileTypeRules {
            rules: rules
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
                .collect(),
            fallback: None,
        }
    }

    /// Tag used when no rule matches
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Extension looked up for `path`
    pub fn extension(path: &str) -> &str {
        let basename = path.rsplit('/').next().unwrap_or(path);
        basename.rsplit('.').next().unwrap_or(basename)
    }

    /// Type tag for `path`
    pub fn guess(&self, path: &str) -> ReconcileResult<&str> {
        let extension = Self::extension(path);
        self.rules
            .get(&extension.to_lowercase())
            .or(self.fallback.as_ref())
            .map(String::as_str)
            .ok_or_else(|| ReconcileError::UnknownFileType {
                path: path.to_string(),
                extension: extension.to_string(),
            })
    }
}

impl From<&FileTypeConfig> for FileTypeRules {
    fn from(config: &FileTypeConfig) -> Self {
        let rules = FileTypeRules::new(&config.rules);
        match &config.fallback {
            Some(fallback) => rules.with_fallback(fallback.clone()),
            None => rules,
        }
    }
}
