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

mod commands;
mod output;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use commands::*;
use ctree_config::Config;
use ctree_observability::{init_tracing_with_config, verbosity_level, LogConfig};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ctree")]
#[command(version, about = "Reconcile a published archive tree with its metadata store")]
#[command(
    long_about = "ctree compares the tree listing published by the archive with the rows of the
metadata store, records what was added, withdrawn, moved or replaced in a dated
change-log entry, and republishes the change-log and the tree listing."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, YAML or JSON); defaults to ./ctree.toml
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format (pretty, compact, json); overrides the configuration
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile and republish the tree listing and change-log
    Run(RunCmd),

    /// Show the changes a run would publish
    Diff(DiffCmd),

    /// Write the metadata store out as a tree listing
    Dump(DumpCmd),

    /// Inspect or discard the checkpoint of an interrupted run
    #[command(subcommand)]
    Checkpoint(CheckpointCmd),

    /// Show an archived object and optionally download it
    Fetch(FetchCmd),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that need no configuration
    match &cli.command {
        Commands::Version => {
            print_version();
            return Ok(());
        }
        Commands::Completions { shell } => {
            generate_completions(*shell);
            return Ok(());
        }
        _ => {}
    }

    let config = match load_config(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&cli, &config) {
        output::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }

    let result = match &cli.command {
        Commands::Run(cmd) => cmd.execute(&config).await,
        Commands::Diff(cmd) => cmd.execute(&config).await,
        Commands::Dump(cmd) => cmd.execute(&config).await,
        Commands::Checkpoint(cmd) => cmd.execute(&config).await,
        Commands::Fetch(cmd) => cmd.execute(&config).await,
        Commands::Version | Commands::Completions { .. } => Ok(()),
    };

    // Handle errors
    if let Err(e) = result {
        output::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

/// Command-line flags win over the `[observability]` section.
fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let format = cli
        .log_format
        .as_deref()
        .unwrap_or(config.observability.log_format.as_str());
    let level = verbosity_level(cli.verbose, cli.quiet)
        .unwrap_or(config.observability.log_level.as_str());

    let log_config =
        LogConfig::from_settings(level, format)?.with_color(console::colors_enabled_stderr());
    // A subscriber installed earlier (tests) is fine
    init_tracing_with_config(log_config).ok();
    Ok(())
}

fn print_version() {
    println!("ctree {}", env!("CARGO_PKG_VERSION"));
    println!("rust-version: {}", env!("CARGO_PKG_RUST_VERSION"));
    println!("license: {}", env!("CARGO_PKG_LICENSE"));
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "ctree", &mut io::stdout());
}
