// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Operation catalog
//!
//! Constructors for the container operations the continuous-training
//! pipeline is made of. Each op is opaque: only its image, command, inputs
//! and declared outputs are known here.

use serde::{Deserialize, Serialize};

use crate::pipeline::{InputBinding, OpSpec, OutputRef, Step};

/// Container images used by the operation catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpCatalog {
    /// Image that ships the training/evaluation/deployment ops
    #[serde(default = "default_ops_image")]
    pub ops: String,

    /// Lightweight image for informational and guard steps
    #[serde(default = "default_print_image")]
    pub print: String,
}

fn default_ops_image() -> String {
    "continuous-training-ops:latest".to_string()
}

fn default_print_image() -> String {
    "alpine:3.18".to_string()
}

impl Default for OpCatalog {
    fn default() -> Self {
        Self {
            ops: default_ops_image(),
            print: default_print_image(),
        }
    }
}

impl OpCatalog {
    /// Decide whether any slides still need preprocessing
    pub fn check_preprocess_proceed(&self) -> Step {
        Step::new("check-preprocess-proceed", self.python_op("check_preprocess_proceed", &[]))
            .with_output("is_preprocess_required")
            .with_output("preprocess_required_slide_paths")
    }

    /// Preprocess the listed slides
    pub fn data_preprocess(&self, slide_paths: &OutputRef) -> Step {
        Step::new(
            "data-preprocess",
            self.python_op("data_preprocess", &["preprocess_required_slide_paths"]),
        )
        .with_input(
            "preprocess_required_slide_paths",
            InputBinding::upstream(slide_paths),
        )
    }

    /// Train a model
    pub fn train(&self, batch_size: u32, seed: u64) -> Step {
        Step::new("train", self.python_op("train", &["batch_size", "seed"]))
            .with_input("batch_size", InputBinding::literal(batch_size))
            .with_input("seed", InputBinding::literal(seed))
            .with_output("target_checkpoints_path")
    }

    /// Evaluate trained checkpoints
    pub fn evaluate(
        &self,
        target_checkpoints_path: &OutputRef,
        prediction_threshold: f64,
        seed: u64,
    ) -> Step {
        Step::new(
            "evaluate",
            self.python_op(
                "evaluate",
                &["target_checkpoints_path", "prediction_threshold", "seed"],
            ),
        )
        .with_input(
            "target_checkpoints_path",
            InputBinding::upstream(target_checkpoints_path),
        )
        .with_input(
            "prediction_threshold",
            InputBinding::literal(prediction_threshold),
        )
        .with_input("seed", InputBinding::literal(seed))
        .with_output("target_checkpoints_path")
        .with_output("checkpoint_metrics_filename")
    }

    /// Pick a checkpoint worth deploying, if any
    pub fn check_deployable(
        &self,
        target_checkpoints_path: &OutputRef,
        checkpoint_metrics_filename: &OutputRef,
    ) -> Step {
        Step::new(
            "check-deployable",
            self.python_op(
                "check_deployable",
                &["target_checkpoints_path", "checkpoint_metrics_filename"],
            ),
        )
        .with_input(
            "target_checkpoints_path",
            InputBinding::upstream(target_checkpoints_path),
        )
        .with_input(
            "checkpoint_metrics_filename",
            InputBinding::upstream(checkpoint_metrics_filename),
        )
        .with_output("deployable_checkpoint_info")
        .with_output("is_deployable_checkpoint_exist")
    }

    /// Point the serving configuration at the chosen checkpoint
    pub fn update_deploy_config(&self, deployable_checkpoint_info: &OutputRef) -> Step {
        Step::new(
            "update-deploy-config",
            self.python_op("update_deploy_config", &["deployable_checkpoint_info"]),
        )
        .with_input(
            "deployable_checkpoint_info",
            InputBinding::upstream(deployable_checkpoint_info),
        )
    }

    /// Roll out the updated deployment
    pub fn deploy(&self) -> Step {
        Step::new("deploy", self.python_op("deploy", &[]))
    }

    /// Informational no-op
    pub fn print(&self, message: &str) -> Step {
        let op = OpSpec {
            image: self.print.clone(),
            command: vec!["echo".to_string()],
            args: vec![OpSpec::input_placeholder("message")],
        };
        Step::new("print", op).with_input("message", InputBinding::literal(message))
    }

    /// Fail the workflow, reporting the unexpected decision value
    pub fn fail(&self, value: &OutputRef) -> Step {
        let op = OpSpec {
            image: self.print.clone(),
            command: vec!["sh".to_string(), "-c".to_string()],
            args: vec![
                "echo \"unexpected branch value: $0\" >&2; exit 1".to_string(),
                OpSpec::input_placeholder("value"),
            ],
        };
        Step::new("fail", op).with_input("value", InputBinding::upstream(value))
    }

    fn python_op(&self, module: &str, inputs: &[&str]) -> OpSpec {
        let mut args = Vec::with_capacity(inputs.len() * 2);
        for input in inputs {
            args.push(format!("--{}", input));
            args.push(OpSpec::input_placeholder(input));
        }

        OpSpec {
            image: self.ops.clone(),
            command: vec!["python".to_string(), "-m".to_string(), format!("ops.{}", module)],
            args,
        }
    }
}
