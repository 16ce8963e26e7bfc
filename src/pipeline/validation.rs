// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Pipeline validation
//!
//! Validates a pipeline definition before it is compiled.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::errors::CtflowError;
use crate::pipeline::{BranchValue, ConditionGroup, DagBuilder, OutputRef, Pipeline, Step};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline definition
    pub fn validate(pipeline: &Pipeline) -> Result<ValidationResult, CtflowError> {
        let mut result = ValidationResult::new();

        if pipeline.steps.is_empty() {
            result.add_error("Pipeline has no steps defined");
        }

        let mut seen_names = HashSet::new();
        for step in &pipeline.steps {
            if !seen_names.insert(&step.name) {
                result.add_error(&format!("Duplicate step name: '{}'", step.name));
            }
        }

        let mut seen_groups = HashSet::new();
        for group in &pipeline.groups {
            if !seen_groups.insert(&group.id) {
                result.add_error(&format!("Duplicate condition group: '{}'", group.id));
            }
            if let Some(parent) = &group.parent {
                if pipeline.get_group(parent).is_none() {
                    result.add_error(&format!(
                        "Condition group '{}': Parent group '{}' does not exist",
                        group.id, parent
                    ));
                }
            }
        }

        Self::validate_template_names(pipeline, &mut result);

        // Cycles and unknown dependencies
        match DagBuilder::build(pipeline) {
            Ok(_) => {}
            Err(CtflowError::CircularDependency { steps }) => {
                result.add_error(&format!("Circular dependency: {}", steps.join(" → ")));
            }
            Err(CtflowError::UnknownDependency { step, dependency }) => {
                result.add_error(&format!(
                    "Step '{}' depends on unknown step '{}'",
                    step, dependency
                ));
            }
            // already reported above
            Err(CtflowError::DuplicateStep { .. }) => {}
            Err(e) => {
                result.add_error(&format!("DAG validation error: {}", e));
            }
        }

        for step in &pipeline.steps {
            Self::validate_step(step, pipeline, &mut result);
        }

        for group in &pipeline.groups {
            Self::validate_group(group, pipeline, &mut result);
        }

        Self::validate_branches(pipeline, &mut result);

        Ok(result)
    }

    /// The pipeline, its steps and its condition groups each become a
    /// workflow template, so their names must not collide
    fn validate_template_names(pipeline: &Pipeline, result: &mut ValidationResult) {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        owners.insert(pipeline.name.as_str(), "the pipeline");

        let names = pipeline
            .steps
            .iter()
            .map(|s| (s.name.as_str(), "a step"))
            .chain(pipeline.groups.iter().map(|g| (g.id.as_str(), "a condition group")));

        for (name, kind) in names {
            match owners.get(name).copied() {
                // same-kind duplicates are reported above
                Some(owner) if owner != kind => {
                    result.add_error(&format!(
                        "Template name '{}' is used by both {} and {}",
                        name, owner, kind
                    ));
                }
                Some(_) => {}
                None => {
                    owners.insert(name, kind);
                }
            }
        }
    }

    /// Validate a single step
    fn validate_step(step: &Step, pipeline: &Pipeline, result: &mut ValidationResult) {
        if step.op.image.is_empty() {
            result.add_error(&format!("Step '{}': Container image is empty", step.name));
        }

        if let Some(group) = &step.group {
            if pipeline.get_group(group).is_none() {
                result.add_error(&format!(
                    "Step '{}': Condition group '{}' does not exist",
                    step.name, group
                ));
            }
        }

        let mut seen_inputs = HashSet::new();
        for input in &step.inputs {
            if !seen_inputs.insert(&input.name) {
                result.add_error(&format!(
                    "Step '{}': Input '{}' is bound twice",
                    step.name, input.name
                ));
            }
        }

        let scope = pipeline.step_chain(step);
        for r in step.upstream_refs() {
            Self::validate_ref(&step.name, r, &scope, pipeline, result);
        }

        if let Some(limits) = &step.resources {
            if limits.gpu == Some(0) {
                result.add_error(&format!(
                    "Step '{}': GPU limit must be at least 1 when set",
                    step.name
                ));
            }
            if let Some(cpu) = &limits.cpu {
                if !cpu_quantity().is_match(cpu) {
                    result.add_error(&format!(
                        "Step '{}': Invalid CPU quantity '{}'",
                        step.name, cpu
                    ));
                }
            }
            if let Some(memory) = &limits.memory {
                if !memory_quantity().is_match(memory) {
                    result.add_error(&format!(
                        "Step '{}': Invalid memory quantity '{}'",
                        step.name, memory
                    ));
                }
            }
        }
    }

    /// A group's condition is evaluated in the scope that encloses the group
    fn validate_group(group: &ConditionGroup, pipeline: &Pipeline, result: &mut ValidationResult) {
        let scope = pipeline.group_chain(group.parent.as_deref());
        let context = format!("Condition group '{}'", group.id);
        Self::validate_ref(&context, &group.condition.operand, &scope, pipeline, result);
    }

    /// Check that a referenced output exists and has run whenever the consumer runs
    fn validate_ref(
        consumer: &str,
        r: &OutputRef,
        scope: &[String],
        pipeline: &Pipeline,
        result: &mut ValidationResult,
    ) {
        let Some(producer) = pipeline.get_step(&r.step) else {
            result.add_error(&format!(
                "{}: References unknown step '{}'",
                consumer, r.step
            ));
            return;
        };

        if !producer.has_output(&r.output) {
            result.add_error(&format!(
                "{}: Step '{}' has no output named '{}'",
                consumer, r.step, r.output
            ));
        }

        let producer_scope = pipeline.step_chain(producer);
        if !scope.starts_with(&producer_scope) {
            result.add_error(&format!(
                "{}: Output '{}' is produced inside a condition group that does not enclose it",
                consumer, r
            ));
        }
    }

    /// Check branch coverage per decision point
    fn validate_branches(pipeline: &Pipeline, result: &mut ValidationResult) {
        let mut decisions: HashMap<(Option<&str>, &OutputRef), Vec<BranchValue>> = HashMap::new();
        let mut order = Vec::new();

        for group in &pipeline.groups {
            let key = (group.parent.as_deref(), &group.condition.operand);
            let values = decisions.entry(key).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });

            if values.contains(&group.condition.expected) {
                result.add_error(&format!(
                    "Condition group '{}': Another group in the same scope already branches on {} == {}",
                    group.id, group.condition.operand, group.condition.expected
                ));
            }
            values.push(group.condition.expected);
        }

        for key in order {
            let values = &decisions[&key];
            for value in values {
                if let Some(other) = value.complement() {
                    if !values.contains(&other) {
                        result.add_warning(&format!(
                            "Decision on '{}' has no '{}' branch; that outcome runs nothing",
                            key.1, other
                        ));
                    }
                }
            }
        }
    }
}

fn cpu_quantity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+(\.[0-9]+)?m?$").expect("valid regex"))
}

fn memory_quantity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9]+(\.[0-9]+)?([EPTGMk]|[EPTGMK]i)?$").expect("valid regex")
    })
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
