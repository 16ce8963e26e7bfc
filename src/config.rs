// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Build configuration
//!
//! Loaded from `ctflow.yaml`. Every field is optional; a missing file means
//! the compiled-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{CtflowError, CtflowResult};
use crate::manifest::default_tool_root;
use crate::pipeline::{OpCatalog, TrainingParams, UnhandledBranchPolicy};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "ctflow.yaml";

/// Configuration for `ctflow build`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtflowConfig {
    /// Directory the output location is derived from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_root: Option<PathBuf>,

    /// Behaviour when a decision step emits an unexpected value
    pub unhandled_branch: UnhandledBranchPolicy,

    /// Literal pipeline parameters
    pub training: TrainingParams,

    /// Container images
    pub images: OpCatalog,
}

impl CtflowConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> CtflowResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CtflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML
    pub fn from_yaml(yaml: &str) -> CtflowResult<Self> {
        // an empty document deserializes as null
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Load configuration, falling back to defaults if the file is absent
    pub fn load_or_default(path: &Path) -> CtflowResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        Self::from_file(path)
    }

    /// Tool root to build from: the CLI override, then the configured
    /// value, then the working directory
    pub fn resolve_tool_root(&self, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.tool_root.clone())
            .unwrap_or_else(default_tool_root)
    }
}
