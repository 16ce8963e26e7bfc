// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for ctflow.

pub mod build;
pub mod graph;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{CtflowConfig, DEFAULT_CONFIG_FILE};
use crate::pipeline::{continuous_training_pipeline, Pipeline};

/// Continuous-training workflow generator
///
/// Declares the continuous-training pipeline and deploys it as a workflow template.
#[derive(Parser, Debug)]
#[clap(
    name = "ctflow",
    version,
    about = "Generate the continuous-training workflow template",
    long_about = None,
    after_help = "Examples:\n\
        ctflow build                    Write the workflow template\n\
        ctflow build --stdout           Print the template instead\n\
        ctflow graph --format mermaid   Show the step graph\n\
        ctflow validate                 Check the pipeline definition\n\n\
        See 'ctflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Configuration file (optional)
    #[clap(
        long,
        global = true,
        env = "CTFLOW_CONFIG",
        default_value = DEFAULT_CONFIG_FILE,
        value_name = "FILE"
    )]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile the pipeline and write the workflow template
    Build {
        /// Tool root; the template is written to <ROOT>/../resources/deployed
        #[clap(short, long, value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Print the template to stdout instead of writing it
        #[clap(long)]
        stdout: bool,
    },

    /// Show the pipeline as a graph
    Graph {
        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Validate the pipeline definition
    Validate,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Declare the pipeline described by `config`
pub(crate) fn declare_pipeline(config: &CtflowConfig) -> miette::Result<Pipeline> {
    let pipeline =
        continuous_training_pipeline(&config.training, &config.images, config.unhandled_branch)?;
    Ok(pipeline)
}
