// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Workflow generation
//!
//! validate → compile → override → write. Nothing touches the filesystem
//! until every earlier phase has succeeded.

use std::path::PathBuf;
use tracing::{debug, warn};

use crate::compiler::{ArgoCompiler, Compiler};
use crate::config::CtflowConfig;
use crate::errors::{CtflowError, CtflowResult};
use crate::manifest::{Manifest, ManifestOverrides, ManifestWriter};
use crate::pipeline::{continuous_training_pipeline, Pipeline, PipelineValidator};

/// Turns a pipeline into a deployed workflow template
pub struct WorkflowGenerator {
    compiler: Box<dyn Compiler>,
    overrides: ManifestOverrides,
}

impl WorkflowGenerator {
    /// Generator using the given compiler and the default overrides
    pub fn new(compiler: Box<dyn Compiler>) -> Self {
        Self {
            compiler,
            overrides: ManifestOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: ManifestOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Validate, compile and post-process a pipeline
    pub fn render(&self, pipeline: &Pipeline) -> CtflowResult<Manifest> {
        let validation = PipelineValidator::validate(pipeline)?;
        for warning in &validation.warnings {
            warn!("{}", warning);
        }
        if !validation.is_valid() {
            return Err(CtflowError::InvalidPipeline {
                reason: validation.errors.join("; "),
                help: Some("Run 'ctflow validate' for the full report".to_string()),
            });
        }

        let document = self.compiler.compile(pipeline)?;
        debug!(pipeline = %pipeline.name, "compiled pipeline");

        let mut manifest = Manifest::from_value(document)?;
        self.overrides.apply(&mut manifest)?;

        Ok(manifest)
    }

    /// Render a pipeline and write it, returning the written path
    pub fn generate(&self, pipeline: &Pipeline, writer: &ManifestWriter) -> CtflowResult<PathBuf> {
        let manifest = self.render(pipeline)?;
        writer.write(&manifest)
    }
}

impl Default for WorkflowGenerator {
    fn default() -> Self {
        Self::new(Box::new(ArgoCompiler::new()))
    }
}

/// Build the continuous-training pipeline from `config` and render it
pub fn render_continuous_training_workflow(config: &CtflowConfig) -> CtflowResult<Manifest> {
    let pipeline =
        continuous_training_pipeline(&config.training, &config.images, config.unhandled_branch)?;

    WorkflowGenerator::default().render(&pipeline)
}

/// Build, render and write the continuous-training workflow template.
///
/// `tool_root` overrides the configured tool root.
pub fn create_continuous_training_workflow(
    config: &CtflowConfig,
    tool_root: Option<&std::path::Path>,
) -> CtflowResult<PathBuf> {
    let root = config.resolve_tool_root(tool_root);
    let writer = ManifestWriter::for_tool_root(&root);

    let manifest = render_continuous_training_workflow(config)?;
    writer.write(&manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::OUTPUT_FILENAME;
    use crate::pipeline::{OpCatalog, Step, TrainingParams, UnhandledBranchPolicy};
    use serde_yaml::Value;
    use tempfile::TempDir;

    /// Returns a fixed document regardless of the pipeline
    struct FixedCompiler(Value);

    impl Compiler for FixedCompiler {
        fn compile(&self, _pipeline: &Pipeline) -> CtflowResult<Value> {
            Ok(self.0.clone())
        }
    }

    fn pipeline() -> Pipeline {
        continuous_training_pipeline(
            &TrainingParams::default(),
            &OpCatalog::default(),
            UnhandledBranchPolicy::Skip,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_spec_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::for_tool_root(&temp_dir.path().join("pipeline"));
        let document: Value = serde_yaml::from_str(
            "kind: Workflow\nmetadata:\n  generateName: x-\n  annotations: {}\n",
        )
        .unwrap();
        let generator = WorkflowGenerator::new(Box::new(FixedCompiler(document)));

        let err = generator.generate(&pipeline(), &writer).unwrap_err();

        assert!(matches!(err, CtflowError::MissingField { ref path } if path == "spec"));
        assert!(!writer.output_path().exists());
        assert!(!writer.output_dir().exists());
    }

    #[test]
    fn test_invalid_pipeline_is_rejected() {
        let mut pipeline = Pipeline::new("broken");
        pipeline.steps.push(Step::new("a", OpCatalog::default().deploy().op));
        pipeline.steps.push(Step::new("a", OpCatalog::default().deploy().op));

        let err = WorkflowGenerator::default().render(&pipeline).unwrap_err();
        assert!(matches!(err, CtflowError::InvalidPipeline { .. }));
    }

    #[test]
    fn test_deployed_manifest_fields() {
        let manifest = WorkflowGenerator::default().render(&pipeline()).unwrap();

        assert_eq!(manifest.kind(), Some("WorkflowTemplate"));
        assert_eq!(manifest.name(), Some("continuous-training-template"));
        assert_eq!(manifest.generate_name(), None);
        assert_eq!(manifest.namespace(), Some("argo"));
        assert_eq!(manifest.service_account_name(), Some("default"));
        assert_eq!(manifest.artifact_repository_key(), Some("default"));
        assert_eq!(
            manifest.annotation("avp_path"),
            Some("avp/data/nwd-pipeline-continuous-training")
        );
        assert_eq!(
            manifest.as_mapping()["spec"]["entrypoint"].as_str(),
            Some("continuous-training-pipeline")
        );
    }

    #[test]
    fn test_custom_overrides() {
        let overrides = ManifestOverrides {
            namespace: "ml-staging".to_string(),
            ..Default::default()
        };
        let manifest = WorkflowGenerator::default()
            .with_overrides(overrides)
            .render(&pipeline())
            .unwrap();

        assert_eq!(manifest.namespace(), Some("ml-staging"));
        assert_eq!(manifest.name(), Some("continuous-training-template"));
    }

    #[test]
    fn test_build_twice_is_identical() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("pipeline");
        let config = CtflowConfig::default();

        let first_path = create_continuous_training_workflow(&config, Some(root.as_path())).unwrap();
        let first = std::fs::read(&first_path).unwrap();

        let second_path = create_continuous_training_workflow(&config, Some(root.as_path())).unwrap();
        let second = std::fs::read(&second_path).unwrap();

        assert_eq!(first_path, second_path);
        assert_eq!(first, second);
        assert_eq!(
            first_path,
            temp_dir
                .path()
                .join("resources")
                .join("deployed")
                .join(OUTPUT_FILENAME)
        );
    }

    #[test]
    fn test_config_reaches_manifest() {
        let mut config = CtflowConfig::default();
        config.images.ops = "registry.local/ct-ops:2.0".to_string();
        config.training.memory_limit = "16Gi".to_string();

        let manifest = render_continuous_training_workflow(&config).unwrap();
        let yaml = manifest.to_yaml().unwrap();

        assert!(yaml.contains("registry.local/ct-ops:2.0"));
        assert!(yaml.contains("16Gi"));
        assert!(!yaml.contains("12G\n"));
    }
}
