// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Pipeline builder
//!
//! Declares steps and condition groups in a single pass. Condition groups
//! are scoped: every step added inside the closure passed to
//! [`PipelineBuilder::condition`] belongs to that group.

use tracing::debug;

use crate::errors::{CtflowError, CtflowResult};
use crate::pipeline::{Condition, ConditionGroup, Pipeline, Step, StepHandle};

/// Single-pass pipeline builder
pub struct PipelineBuilder {
    pipeline: Pipeline,
    scope: Vec<String>,
    group_counter: usize,
}

impl PipelineBuilder {
    /// Start a new pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline::new(name),
            scope: Vec::new(),
            group_counter: 0,
        }
    }

    /// Set the pipeline description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.pipeline.description = Some(description.into());
        self
    }

    /// Add a step to the current scope.
    ///
    /// A name already taken gets a numeric suffix (`print`, `print-2`, ...).
    /// Every upstream reference and `after` edge must point to a step that
    /// was declared earlier.
    pub fn add(&mut self, mut step: Step) -> CtflowResult<StepHandle> {
        step.name = self.unique_name(&step.name);
        step.group = self.scope.last().cloned();

        for dep in &step.after {
            if self.pipeline.get_step(dep).is_none() {
                return Err(CtflowError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        for r in step.upstream_refs() {
            let producer = self.pipeline.get_step(&r.step).ok_or_else(|| {
                CtflowError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: r.step.clone(),
                }
            })?;
            if !producer.has_output(&r.output) {
                return Err(CtflowError::UnknownOutput {
                    step: r.step.clone(),
                    output: r.output.clone(),
                });
            }
        }

        debug!(step = %step.name, group = ?step.group, "declared step");

        let handle = StepHandle::new(&step);
        self.pipeline.steps.push(step);
        Ok(handle)
    }

    /// Declare a condition group and populate it.
    ///
    /// Returns the generated group id.
    pub fn condition<F>(&mut self, name: &str, condition: Condition, body: F) -> CtflowResult<String>
    where
        F: FnOnce(&mut Self) -> CtflowResult<()>,
    {
        let producer = self
            .pipeline
            .get_step(&condition.operand.step)
            .ok_or_else(|| {
                CtflowError::invalid_pipeline(format!(
                    "condition '{}' reads unknown step '{}'",
                    name, condition.operand.step
                ))
            })?;
        if !producer.has_output(&condition.operand.output) {
            return Err(CtflowError::UnknownOutput {
                step: condition.operand.step.clone(),
                output: condition.operand.output.clone(),
            });
        }

        self.group_counter += 1;
        let id = format!("condition-{}-{}", name, self.group_counter);

        debug!(group = %id, condition = %condition, "declared condition group");

        self.pipeline.groups.push(ConditionGroup {
            id: id.clone(),
            name: name.to_string(),
            condition,
            parent: self.scope.last().cloned(),
        });

        self.scope.push(id.clone());
        let result = body(self);
        self.scope.pop();

        result.map(|_| id)
    }

    /// Finish building
    pub fn build(self) -> Pipeline {
        self.pipeline
    }

    fn unique_name(&self, base: &str) -> String {
        if self.pipeline.get_step(base).is_none() {
            return base.to_string();
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.pipeline.get_step(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}
