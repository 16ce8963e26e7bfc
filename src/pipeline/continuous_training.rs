// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! The continuous-training pipeline
//!
//! check → (preprocess → train → evaluate → check deployable → deploy),
//! gated on two boolean-like decisions.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::CtflowResult;
use crate::pipeline::{BranchValue, OpCatalog, OutputRef, Pipeline, PipelineBuilder};

/// Pipeline name; the compiled workflow uses it as entrypoint
pub const PIPELINE_NAME: &str = "continuous-training-pipeline";

/// Literal parameters baked into the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub batch_size: u32,
    pub gpu_num: u32,
    pub seed: u64,
    pub eval_prediction_threshold: f64,
    pub cpu_limit: String,
    pub memory_limit: String,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            batch_size: 64,
            gpu_num: 1,
            seed: 42,
            eval_prediction_threshold: 0.5,
            cpu_limit: "3000m".to_string(),
            memory_limit: "12G".to_string(),
        }
    }
}

/// What happens when a decision step emits neither `"True"` nor `"False"`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledBranchPolicy {
    /// No branch runs; downstream work is silently skipped
    #[default]
    Skip,
    /// A guard step fails the workflow
    Fail,
}

/// Declare the continuous-training pipeline
pub fn continuous_training_pipeline(
    params: &TrainingParams,
    ops: &OpCatalog,
    policy: UnhandledBranchPolicy,
) -> CtflowResult<Pipeline> {
    let mut b = PipelineBuilder::new(PIPELINE_NAME)
        .description("Preprocess new slides, retrain, evaluate and deploy when a better checkpoint exists");

    let check_preprocess_proceed = b.add(ops.check_preprocess_proceed())?;
    let is_preprocess_required = check_preprocess_proceed.output("is_preprocess_required")?;

    b.condition(
        "preprocess-required",
        is_preprocess_required.equals(BranchValue::True),
        |b| {
            let slide_paths =
                check_preprocess_proceed.output("preprocess_required_slide_paths")?;

            let data_preprocess = b.add(
                ops.data_preprocess(&slide_paths)
                    .after(&check_preprocess_proceed),
            )?;

            let train = b.add(
                ops.train(params.batch_size, params.seed)
                    .set_gpu_limit(params.gpu_num)
                    .set_cpu_limit(&params.cpu_limit)
                    .set_memory_limit(&params.memory_limit)
                    .after(&data_preprocess),
            )?;
            let target_checkpoints_path = train.output("target_checkpoints_path")?;

            let evaluate = b.add(
                ops.evaluate(
                    &target_checkpoints_path,
                    params.eval_prediction_threshold,
                    params.seed,
                )
                .set_gpu_limit(params.gpu_num)
                .set_cpu_limit(&params.cpu_limit)
                .set_memory_limit(&params.memory_limit)
                .after(&train),
            )?;

            // evaluate may rename the checkpoint directory
            let target_checkpoints_path = evaluate.output("target_checkpoints_path")?;
            let checkpoint_metrics_filename = evaluate.output("checkpoint_metrics_filename")?;

            let check_deployable = b.add(
                ops.check_deployable(&target_checkpoints_path, &checkpoint_metrics_filename)
                    .after(&evaluate),
            )?;
            let deployable_checkpoint_info =
                check_deployable.output("deployable_checkpoint_info")?;
            let is_deployable_checkpoint_exist =
                check_deployable.output("is_deployable_checkpoint_exist")?;

            b.condition(
                "exist",
                is_deployable_checkpoint_exist.equals(BranchValue::True),
                |b| {
                    let update_deploy_config = b.add(
                        ops.update_deploy_config(&deployable_checkpoint_info)
                            .after(&check_deployable),
                    )?;
                    b.add(ops.deploy().after(&update_deploy_config))?;
                    Ok(())
                },
            )?;

            b.condition(
                "not-exist",
                is_deployable_checkpoint_exist.equals(BranchValue::False),
                |b| {
                    b.add(ops.print("deployed checkpoint: previous"))?;
                    Ok(())
                },
            )?;

            if policy == UnhandledBranchPolicy::Fail {
                unhandled_guard(b, ops, "deployable-unhandled", &is_deployable_checkpoint_exist)?;
            }

            Ok(())
        },
    )?;

    b.condition(
        "preprocess-not-required",
        is_preprocess_required.equals(BranchValue::False),
        |b| {
            b.add(ops.print("all of the slides are pre-processed"))?;
            Ok(())
        },
    )?;

    if policy == UnhandledBranchPolicy::Fail {
        unhandled_guard(&mut b, ops, "preprocess-unhandled", &is_preprocess_required)?;
    }

    let pipeline = b.build();
    info!(
        steps = pipeline.steps.len(),
        groups = pipeline.groups.len(),
        "declared {}",
        pipeline.name
    );

    Ok(pipeline)
}

fn unhandled_guard(
    b: &mut PipelineBuilder,
    ops: &OpCatalog,
    name: &str,
    flag: &OutputRef,
) -> CtflowResult<()> {
    b.condition(name, flag.equals(BranchValue::Unhandled), |b| {
        b.add(ops.fail(flag))?;
        Ok(())
    })?;
    Ok(())
}
