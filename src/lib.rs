// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! # ctflow - Continuous-Training Workflow Generator
//!
//! `ctflow` declares the continuous-training pipeline as a DAG of container
//! steps and deploys it as an Argo `WorkflowTemplate`.
//!
//! ## Features
//!
//! - **Declarative pipeline** - Steps, outputs and nested condition groups
//! - **Argo compiler** - Deterministic `Workflow` manifests
//! - **Deployment overrides** - Namespace, service account, template name and secrets path
//! - **Validation** - Scope, branch and resource checks before anything is written
//!
//! ## Quick Start
//!
//! ```bash
//! # Write resources/deployed/managed-continuous-training-workflow-template.yml
//! ctflow build
//!
//! # Inspect the step graph
//! ctflow graph --format mermaid
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod generator;
pub mod manifest;
pub mod pipeline;

// Re-export commonly used types
pub use compiler::{ArgoCompiler, Compiler};
pub use config::CtflowConfig;
pub use errors::{CtflowError, CtflowResult};
pub use generator::{create_continuous_training_workflow, WorkflowGenerator};
pub use manifest::{Manifest, ManifestOverrides, ManifestWriter};
pub use pipeline::{continuous_training_pipeline, Pipeline, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
