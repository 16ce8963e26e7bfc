// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Pipeline compilers
//!
//! A compiler turns a [`Pipeline`] into an untyped workflow document. The
//! generator only depends on the [`Compiler`] trait, so the concrete
//! workflow dialect can be swapped.

mod argo;

pub use argo::ArgoCompiler;

use serde_yaml::Value;

use crate::errors::CtflowError;
use crate::pipeline::Pipeline;

/// Trait for pipeline compilers
pub trait Compiler: Send + Sync {
    /// Render a pipeline into a workflow document (a mapping of mappings)
    fn compile(&self, pipeline: &Pipeline) -> Result<Value, CtflowError>;
}
