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

//! Logging set-up for ctree.
//!
//! All crates in the workspace log through the `tracing` facade with
//! structured fields. This crate installs the subscriber: pretty, compact or
//! JSON output, filtered by an `EnvFilter` directive taken from the
//! configuration, else `RUST_LOG`, else `info`.
//!
//! ```ignore
//! use ctree_observability::{init_tracing_with_config, LogConfig, LogFormat};
//!
//! init_tracing_with_config(LogConfig::new().with_format(LogFormat::Json))?;
//! ```

pub mod config;
pub mod initialization;

pub use config::{verbosity_level, LogConfig, LogError, LogFormat, LogOutput, LogResult};
pub use initialization::{init_tracing, init_tracing_with_config};
