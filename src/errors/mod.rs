// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Error types
//!
//! Every failure in ctflow is fatal to the build that raised it. Errors carry
//! miette diagnostics so the CLI can print an actionable hint.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ctflow operations
pub type CtflowResult<T> = Result<T, CtflowError>;

/// Main error type for ctflow
#[derive(Error, Debug, Diagnostic)]
pub enum CtflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid pipeline definition: {reason}")]
    #[diagnostic(code(ctflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Step '{step}' is declared more than once")]
    #[diagnostic(
        code(ctflow::duplicate_step),
        help("Step names identify tasks in the workflow and must be unique")
    )]
    DuplicateStep { step: String },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(ctflow::unknown_dependency),
        help("Declare '{dependency}' before referencing it")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{step}' does not declare an output named '{output}'")]
    #[diagnostic(code(ctflow::unknown_output))]
    UnknownOutput { step: String, output: String },

    #[error("Circular dependency detected")]
    #[diagnostic(
        code(ctflow::circular_dependency),
        help("Review the ordering edges between steps to remove the cycle")
    )]
    CircularDependency { steps: Vec<String> },

    // ─────────────────────────────────────────────────────────────────────────
    // Manifest Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Compiled manifest is missing required field '{path}'")]
    #[diagnostic(
        code(ctflow::missing_field),
        help("The compiler output changed shape; no manifest was written")
    )]
    MissingField { path: String },

    #[error("Manifest field '{path}' has the wrong type, expected {expected}")]
    #[diagnostic(code(ctflow::invalid_field))]
    InvalidField { path: String, expected: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(ctflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(ctflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("Failed to create directory '{path}': {error}")]
    #[diagnostic(code(ctflow::directory_create_error))]
    DirectoryCreateError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("YAML error: {message}")]
    #[diagnostic(code(ctflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(ctflow::json_error))]
    Json { message: String },
}

impl From<serde_yaml::Error> for CtflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for CtflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl CtflowError {
    /// Create an invalid pipeline error without a hint
    pub fn invalid_pipeline(reason: impl Into<String>) -> Self {
        Self::InvalidPipeline {
            reason: reason.into(),
            help: None,
        }
    }

    /// Create a missing field error for a dotted manifest path
    pub fn missing_field(path: impl Into<String>) -> Self {
        Self::MissingField { path: path.into() }
    }
}
