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

//! Configuration for the ctree reconciliation engine
//!
//! A single [`Config`] value is built once at process start and passed into
//! every component that needs it. It can be read from TOML, YAML or JSON,
//! overridden through `CTREE_*` environment variables and is validated before
//! any collaborator is contacted.
//!
//! # Example
//!
//! ```no_run
//! use ctree_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = ConfigLoader::new();
//!     let config = loader.load_with_overrides("ctree.toml").await?;
//!
//!     println!("Published tree mounted at: {}", config.archive.ftp_mount);
//!     println!("Remote objects API: {}", config.remote.objects_url());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

// Re-export commonly used items
pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_overrides, ConfigFormat, ConfigLoader};
pub use schema::*;
pub use validation::Validator;
