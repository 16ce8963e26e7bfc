// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Manifest writer
//!
//! Writes the manifest to `<tool-root>/../resources/deployed/`. Existing
//! files are overwritten in place.

use std::path::{Component, Path, PathBuf};
use tracing::info;

use super::Manifest;
use crate::errors::{CtflowError, CtflowResult};

/// File name of the deployed workflow template
pub const OUTPUT_FILENAME: &str = "managed-continuous-training-workflow-template.yml";

/// Output directory relative to the parent of the tool root
const OUTPUT_SUBDIR: &str = "resources/deployed";

/// Tool root used when none is configured: the working directory
pub fn default_tool_root() -> PathBuf {
    PathBuf::from(".")
}

/// Writes manifests to a fixed location
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    output_dir: PathBuf,
}

impl ManifestWriter {
    /// Writer for `<tool_root>/../resources/deployed`.
    ///
    /// The `..` is resolved lexically, so `tool_root` does not have to exist.
    /// Only a trailing directory name is stripped; a root ending in `.` or
    /// `..` gets an explicit `..` appended.
    pub fn for_tool_root(tool_root: &Path) -> Self {
        let base = match (tool_root.components().next_back(), tool_root.parent()) {
            (Some(Component::Normal(_)), Some(parent)) if !parent.as_os_str().is_empty() => {
                parent.to_path_buf()
            }
            (Some(Component::Normal(_)), _) => PathBuf::from("."),
            _ => tool_root.join(".."),
        };

        Self {
            output_dir: base.join(OUTPUT_SUBDIR),
        }
    }

    /// Writer for an explicit output directory
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Full path of the file [`ManifestWriter::write`] produces
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_FILENAME)
    }

    /// Render and write a manifest, returning the written path
    pub fn write(&self, manifest: &Manifest) -> CtflowResult<PathBuf> {
        let content = manifest.to_yaml()?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            CtflowError::DirectoryCreateError {
                path: self.output_dir.clone(),
                error: e.to_string(),
            }
        })?;

        let path = self.output_path();
        std::fs::write(&path, content).map_err(|e| CtflowError::FileWriteError {
            path: path.clone(),
            error: e.to_string(),
        })?;

        info!(path = %path.display(), "wrote workflow template");

        Ok(path)
    }
}
