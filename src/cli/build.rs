// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Build command - compile the pipeline and write the workflow template

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::config::CtflowConfig;
use crate::generator::{create_continuous_training_workflow, render_continuous_training_workflow};

/// Run the build command
pub fn run(config: &CtflowConfig, root: Option<PathBuf>, stdout: bool, verbose: bool) -> Result<()> {
    if stdout {
        let manifest = render_continuous_training_workflow(config)?;
        print!("{}", manifest.to_yaml()?);
        return Ok(());
    }

    println!("{}", "Building workflow template...".bold());

    let path = create_continuous_training_workflow(config, root.as_deref())?;

    println!("  {} Wrote {}", "✓".green(), path.display());

    if verbose {
        println!();
        println!("{}:", "Settings".bold());
        println!("  Unhandled branches: {:?}", config.unhandled_branch);
        println!("  Ops image: {}", config.images.ops);
        println!("  Batch size: {}", config.training.batch_size);
        println!("  GPUs: {}", config.training.gpu_num);
    }

    Ok(())
}
