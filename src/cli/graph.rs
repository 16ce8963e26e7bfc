// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Graph command - visualize the pipeline as a graph

use miette::Result;

use super::{declare_pipeline, GraphFormat};
use crate::config::CtflowConfig;
use crate::pipeline::DagBuilder;

/// Run the graph command
pub fn run(config: &CtflowConfig, format: GraphFormat, _verbose: bool) -> Result<()> {
    let pipeline = declare_pipeline(config)?;

    let dag = DagBuilder::build(&pipeline)?;

    let output = match format {
        GraphFormat::Text => dag.to_text(&pipeline)?,
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid(&pipeline),
    };

    println!("{}", output);

    Ok(())
}
