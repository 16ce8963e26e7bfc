// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Pipeline definitions and types
//!
//! This module defines the step graph of a pipeline, the builder used to
//! declare it, and the continuous-training pipeline itself.

mod builder;
mod continuous_training;
mod dag;
mod definition;
mod ops;
mod validation;

pub use builder::PipelineBuilder;
pub use continuous_training::{
    continuous_training_pipeline, TrainingParams, UnhandledBranchPolicy, PIPELINE_NAME,
};
pub use dag::DagBuilder;
pub use definition::*;
pub use ops::OpCatalog;
pub use validation::{PipelineValidator, ValidationResult};
