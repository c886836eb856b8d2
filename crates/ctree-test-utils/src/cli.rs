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

//! Running the `ctree` binary from tests

use assert_cmd::Command;
use std::path::Path;

/// Command for the `ctree` binary built by this workspace.
///
/// # Example
/// ```ignore
/// use ctree_test_utils::ctree;
///
/// ctree().arg("version").assert().success();
/// ```
#[allow(deprecated)] // cargo_bin is deprecated but still works for our use case
pub fn ctree() -> Command {
    Command::cargo_bin("ctree").expect("ctree binary not found")
}

/// `ctree --config <config>` with logging kept quiet
pub fn ctree_with_config(config: &Path) -> Command {
    let mut cmd = ctree();
    cmd.arg("--config").arg(config).arg("--quiet");
    cmd.env_remove("RUST_LOG");
    cmd
}
