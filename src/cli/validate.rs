// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Validate command - check the pipeline definition

use colored::Colorize;
use miette::Result;

use super::declare_pipeline;
use crate::config::CtflowConfig;
use crate::pipeline::{DagBuilder, PipelineValidator};

/// Run the validate command
pub fn run(config: &CtflowConfig, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let pipeline = declare_pipeline(config)?;
    println!("  {} Pipeline declared", "✓".green());

    let validation = PipelineValidator::validate(&pipeline)?;

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name);
        println!("  Steps: {}", pipeline.steps.len());
        for step in &pipeline.steps {
            let deps = step.predecessors();
            let deps = if deps.is_empty() {
                String::new()
            } else {
                format!(" [after: {}]", deps.join(", "))
            };
            let group = step
                .group
                .as_deref()
                .map(|g| format!(" in {}", g))
                .unwrap_or_default();
            println!("    - {} ({}){}{}", step.name, step.op.image, group, deps.dimmed());
        }
        println!("  Condition groups: {}", pipeline.groups.len());
        for group in &pipeline.groups {
            println!("    - {} (when {})", group.id, group.condition);
        }

        // cycles are already listed as errors
        if let Ok(order) = DagBuilder::build(&pipeline).and_then(|dag| dag.topological_order_names()) {
            println!("  Execution order: {}", order.join(" → "));
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(miette::miette!("Pipeline validation failed"));
    }

    if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }

    Ok(())
}
