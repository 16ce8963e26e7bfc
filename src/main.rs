// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! ctflow - Continuous-Training Workflow Generator
//!
//! Compile the continuous-training pipeline into a deployable workflow template.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ctflow::cli::{Cli, Commands};
use ctflow::CtflowConfig;

fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for `build --stdout`
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ctflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let config = CtflowConfig::load_or_default(&cli.config)?;

    // Dispatch to command handlers
    match cli.command {
        Commands::Build { root, stdout } => {
            ctflow::cli::build::run(&config, root, stdout, cli.verbose)
        }
        Commands::Graph { format } => ctflow::cli::graph::run(&config, format, cli.verbose),
        Commands::Validate => ctflow::cli::validate::run(&config, cli.verbose),
    }
}
