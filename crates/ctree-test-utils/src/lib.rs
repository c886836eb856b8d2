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

//! # ctree test utilities
//!
//! Shared helpers for the ctree crates' tests:
//! - a scratch workspace holding a config, tree listings and a change-log
//! - metadata rows and remote objects seeded for a publishable archive
//! - a handle on the `ctree` binary for CLI tests

pub mod cli;
pub mod fixtures;
pub mod workspace;

pub use cli::ctree;
pub use fixtures::{canonical_tree, record, seed_published, FTP_MOUNT, STAGING_MOUNT};
pub use workspace::TestWorkspace;
