// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Manifest overrides
//!
//! Turns the compiled `Workflow` into the `WorkflowTemplate` the engine is
//! deployed with. Every override is an unconditional assignment.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::Manifest;
use crate::errors::{CtflowError, CtflowResult};

/// Namespace the template is deployed to
pub const NAMESPACE: &str = "argo";

/// Service account the workflow pods run as
pub const SERVICE_ACCOUNT: &str = "default";

/// Kind of the deployed resource
pub const KIND: &str = "WorkflowTemplate";

/// Fixed template name, replacing `metadata.generateName`
pub const TEMPLATE_NAME: &str = "continuous-training-template";

/// Key of the artifact repository configured on the engine
pub const ARTIFACT_REPOSITORY_KEY: &str = "default";

/// Annotation read by the vault secret-injection plugin
pub const AVP_PATH_ANNOTATION: &str = "avp_path";

/// Vault path holding the pipeline secrets
pub const AVP_PATH: &str = "avp/data/nwd-pipeline-continuous-training";

/// Field overrides applied to a compiled manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOverrides {
    pub namespace: String,
    pub service_account_name: String,
    pub kind: String,
    pub name: String,
    pub artifact_repository_key: String,
    /// Extra `metadata.annotations` entries, applied in order
    pub annotations: Vec<(String, String)>,
}

impl Default for ManifestOverrides {
    fn default() -> Self {
        Self {
            namespace: NAMESPACE.to_string(),
            service_account_name: SERVICE_ACCOUNT.to_string(),
            kind: KIND.to_string(),
            name: TEMPLATE_NAME.to_string(),
            artifact_repository_key: ARTIFACT_REPOSITORY_KEY.to_string(),
            annotations: vec![(AVP_PATH_ANNOTATION.to_string(), AVP_PATH.to_string())],
        }
    }
}

impl ManifestOverrides {
    /// Apply every override to `manifest`.
    ///
    /// Fails with a missing-field error if the manifest lost a section it is
    /// expected to carry.
    pub fn apply(&self, manifest: &mut Manifest) -> CtflowResult<()> {
        {
            let metadata = manifest.section_mut("metadata")?;
            set(metadata, "namespace", Value::from(self.namespace.as_str()));
        }

        {
            let spec = manifest.section_mut("spec")?;
            set(spec, "serviceAccountName", Value::from(self.service_account_name.as_str()));
        }

        set(manifest.document_mut(), "kind", Value::from(self.kind.as_str()));

        {
            let metadata = manifest.section_mut("metadata")?;
            metadata
                .shift_remove("generateName")
                .ok_or_else(|| CtflowError::missing_field("metadata.generateName"))?;
            set(metadata, "name", Value::from(self.name.as_str()));
        }

        {
            let spec = manifest.section_mut("spec")?;
            let mut repository = Mapping::new();
            repository.insert(
                Value::from("key"),
                Value::from(self.artifact_repository_key.as_str()),
            );
            set(spec, "artifactRepositoryRef", Value::Mapping(repository));
        }

        {
            let annotations = manifest
                .section_mut("metadata")?
                .get_mut("annotations")
                .and_then(Value::as_mapping_mut)
                .ok_or_else(|| CtflowError::missing_field("metadata.annotations"))?;
            for (key, value) in &self.annotations {
                set(annotations, key, Value::from(value.as_str()));
            }
        }

        debug!(kind = %self.kind, name = %self.name, namespace = %self.namespace, "applied manifest overrides");

        Ok(())
    }
}

fn set(map: &mut Mapping, key: &str, value: Value) {
    map.insert(Value::from(key), value);
}
