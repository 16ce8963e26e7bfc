// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Workflow manifests
//!
//! A [`Manifest`] wraps a compiled workflow document whose required fields
//! have been checked once, at construction. Overrides and the writer work on
//! top of it.

mod overrides;
mod writer;

pub use overrides::{
    ManifestOverrides, ARTIFACT_REPOSITORY_KEY, AVP_PATH, AVP_PATH_ANNOTATION, KIND, NAMESPACE,
    SERVICE_ACCOUNT, TEMPLATE_NAME,
};
pub use writer::{default_tool_root, ManifestWriter, OUTPUT_FILENAME};

use serde_yaml::{Mapping, Value};

use crate::errors::{CtflowError, CtflowResult};

/// A compiled workflow document with its required fields present
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    document: Mapping,
}

impl Manifest {
    /// Check the required fields of a compiled document.
    ///
    /// Requires `kind`, `metadata` (mapping), `metadata.generateName`,
    /// `metadata.annotations` (mapping) and `spec` (mapping).
    pub fn from_value(value: Value) -> CtflowResult<Self> {
        let Value::Mapping(document) = value else {
            return Err(CtflowError::InvalidField {
                path: "<root>".to_string(),
                expected: "mapping".to_string(),
            });
        };

        require(&document, "kind", "kind")?;
        let metadata = require_mapping(&document, "metadata", "metadata")?;
        require(metadata, "generateName", "metadata.generateName")?;
        require_mapping(metadata, "annotations", "metadata.annotations")?;
        require_mapping(&document, "spec", "spec")?;

        Ok(Self { document })
    }

    /// Parse and check a YAML document
    pub fn from_yaml(yaml: &str) -> CtflowResult<Self> {
        Self::from_value(serde_yaml::from_str(yaml)?)
    }

    pub fn kind(&self) -> Option<&str> {
        self.document.get("kind").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata_field("name")
    }

    pub fn generate_name(&self) -> Option<&str> {
        self.metadata_field("generateName")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata_field("namespace")
    }

    /// Look up a `metadata.annotations` entry
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.document
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
    }

    pub fn service_account_name(&self) -> Option<&str> {
        self.document
            .get("spec")
            .and_then(|s| s.get("serviceAccountName"))
            .and_then(Value::as_str)
    }

    /// Key of `spec.artifactRepositoryRef`
    pub fn artifact_repository_key(&self) -> Option<&str> {
        self.document
            .get("spec")
            .and_then(|s| s.get("artifactRepositoryRef"))
            .and_then(|r| r.get("key"))
            .and_then(Value::as_str)
    }

    /// Borrow the underlying document
    pub fn as_mapping(&self) -> &Mapping {
        &self.document
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> CtflowResult<String> {
        serde_yaml::to_string(&self.document).map_err(Into::into)
    }

    pub(crate) fn document_mut(&mut self) -> &mut Mapping {
        &mut self.document
    }

    /// Mutable access to a top-level mapping such as `metadata` or `spec`
    pub(crate) fn section_mut(&mut self, key: &str) -> CtflowResult<&mut Mapping> {
        self.document
            .get_mut(key)
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| CtflowError::missing_field(key))
    }

    fn metadata_field(&self, key: &str) -> Option<&str> {
        self.document
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }
}

fn require<'m>(map: &'m Mapping, key: &str, path: &str) -> CtflowResult<&'m Value> {
    map.get(key).ok_or_else(|| CtflowError::missing_field(path))
}

fn require_mapping<'m>(map: &'m Mapping, key: &str, path: &str) -> CtflowResult<&'m Mapping> {
    require(map, key, path)?
        .as_mapping()
        .ok_or_else(|| CtflowError::InvalidField {
            path: path.to_string(),
            expected: "mapping".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPILED: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: Workflow
metadata:
  generateName: continuous-training-pipeline-
  annotations:
    pipelines.kubeflow.org/pipeline_spec: '{"name": "continuous-training-pipeline"}'
spec:
  entrypoint: continuous-training-pipeline
  templates: []
  serviceAccountName: pipeline-runner
"#;

    #[test]
    fn test_accepts_compiled_shape() {
        let manifest = Manifest::from_yaml(COMPILED).unwrap();

        assert_eq!(manifest.kind(), Some("Workflow"));
        assert_eq!(manifest.generate_name(), Some("continuous-training-pipeline-"));
        assert_eq!(manifest.service_account_name(), Some("pipeline-runner"));
        assert_eq!(manifest.namespace(), None);
        assert_eq!(manifest.artifact_repository_key(), None);
    }

    #[test]
    fn test_missing_spec() {
        let yaml = COMPILED.split("\nspec:").next().unwrap();
        let err = Manifest::from_yaml(yaml).unwrap_err();

        assert!(matches!(err, CtflowError::MissingField { ref path } if path == "spec"));
    }

    #[test]
    fn test_missing_generate_name() {
        let yaml = COMPILED.replace("  generateName: continuous-training-pipeline-\n", "");
        let err = Manifest::from_yaml(&yaml).unwrap_err();

        assert!(
            matches!(err, CtflowError::MissingField { ref path } if path == "metadata.generateName")
        );
    }

    #[test]
    fn test_missing_annotations() {
        let yaml = r#"
kind: Workflow
metadata:
  generateName: x-
spec: {}
"#;
        let err = Manifest::from_yaml(yaml).unwrap_err();

        assert!(
            matches!(err, CtflowError::MissingField { ref path } if path == "metadata.annotations")
        );
    }

    #[test]
    fn test_wrong_section_type() {
        let yaml = r#"
kind: Workflow
metadata: []
spec: {}
"#;
        let err = Manifest::from_yaml(yaml).unwrap_err();

        assert!(matches!(err, CtflowError::InvalidField { ref path, .. } if path == "metadata"));
    }

    #[test]
    fn test_non_mapping_document() {
        let err = Manifest::from_value(Value::String("nope".into())).unwrap_err();
        assert!(matches!(err, CtflowError::InvalidField { .. }));
    }
}
