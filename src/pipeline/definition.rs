// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Pipeline definition structures
//!
//! A pipeline is a value object: steps with typed input bindings, explicit
//! ordering edges and condition groups. Nothing here executes anything.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{CtflowError, CtflowResult};

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name, used as the workflow entrypoint
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Steps in declaration order
    pub steps: Vec<Step>,

    /// Condition groups in declaration order
    #[serde(default)]
    pub groups: Vec<ConditionGroup>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Get all step names
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Get a condition group by id
    pub fn get_group(&self, id: &str) -> Option<&ConditionGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Groups declared directly in the pipeline body
    pub fn top_level_groups(&self) -> Vec<&ConditionGroup> {
        self.groups.iter().filter(|g| g.parent.is_none()).collect()
    }

    /// Groups declared inside another group
    pub fn nested_groups(&self) -> Vec<&ConditionGroup> {
        self.groups.iter().filter(|g| g.parent.is_some()).collect()
    }

    /// Steps declared directly inside `group` (`None` for the pipeline root)
    pub fn steps_in(&self, group: Option<&str>) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| s.group.as_deref() == group)
            .collect()
    }

    /// Groups declared directly inside `group` (`None` for the pipeline root)
    pub fn groups_in(&self, group: Option<&str>) -> Vec<&ConditionGroup> {
        self.groups
            .iter()
            .filter(|g| g.parent.as_deref() == group)
            .collect()
    }

    /// Chain of group ids enclosing `group`, outermost first, `group` included.
    ///
    /// Unknown ids terminate the walk.
    pub fn group_chain(&self, group: Option<&str>) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = group;

        while let Some(id) = current {
            if chain.iter().any(|c| c == id) {
                break;
            }
            chain.push(id.to_string());
            current = self.get_group(id).and_then(|g| g.parent.as_deref());
        }

        chain.reverse();
        chain
    }

    /// Chain of group ids enclosing a step, outermost first
    pub fn step_chain(&self, step: &Step) -> Vec<String> {
        self.group_chain(step.group.as_deref())
    }
}

/// A single unit of work backed by an opaque container operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step name (unique within the pipeline)
    pub name: String,

    /// Container invocation
    pub op: OpSpec,

    /// Input bindings in declaration order
    #[serde(default)]
    pub inputs: Vec<NamedInput>,

    /// Names of outputs this step produces
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Explicit ordering edges (steps that must complete first)
    #[serde(default)]
    pub after: Vec<String>,

    /// Resource limits for heavy compute steps
    #[serde(default)]
    pub resources: Option<ResourceLimits>,

    /// Id of the innermost enclosing condition group
    #[serde(default)]
    pub group: Option<String>,
}

impl Step {
    /// Create a step with no inputs or outputs
    pub fn new(name: impl Into<String>, op: OpSpec) -> Self {
        Self {
            name: name.into(),
            op,
            inputs: Vec::new(),
            outputs: Vec::new(),
            after: Vec::new(),
            resources: None,
            group: None,
        }
    }

    /// Bind an input
    pub fn with_input(mut self, name: impl Into<String>, binding: InputBinding) -> Self {
        self.inputs.push(NamedInput {
            name: name.into(),
            binding,
        });
        self
    }

    /// Declare an output
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    /// Record that this step runs after another one
    pub fn after(mut self, step: &StepHandle) -> Self {
        if !self.after.contains(&step.name) {
            self.after.push(step.name.clone());
        }
        self
    }

    /// Set the GPU limit
    pub fn set_gpu_limit(mut self, gpus: u32) -> Self {
        self.resources.get_or_insert_with(ResourceLimits::default).gpu = Some(gpus);
        self
    }

    /// Set the CPU limit (Kubernetes quantity, e.g. `3000m`)
    pub fn set_cpu_limit(mut self, cpu: impl Into<String>) -> Self {
        self.resources.get_or_insert_with(ResourceLimits::default).cpu = Some(cpu.into());
        self
    }

    /// Set the memory limit (Kubernetes quantity, e.g. `12G`)
    pub fn set_memory_limit(mut self, memory: impl Into<String>) -> Self {
        self.resources.get_or_insert_with(ResourceLimits::default).memory = Some(memory.into());
        self
    }

    /// Check whether this step declares an output
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }

    /// Upstream outputs consumed by this step
    pub fn upstream_refs(&self) -> impl Iterator<Item = &OutputRef> {
        self.inputs.iter().filter_map(|i| i.binding.upstream_ref())
    }

    /// Names of every step this step must wait for, explicit edges first
    pub fn predecessors(&self) -> Vec<&str> {
        let mut preds: Vec<&str> = self.after.iter().map(String::as_str).collect();
        for r in self.upstream_refs() {
            if !preds.contains(&r.step.as_str()) {
                preds.push(&r.step);
            }
        }
        preds
    }
}

/// Handle to a declared step, used to wire later steps to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepHandle {
    pub name: String,
    outputs: Vec<String>,
}

impl StepHandle {
    pub(crate) fn new(step: &Step) -> Self {
        Self {
            name: step.name.clone(),
            outputs: step.outputs.clone(),
        }
    }

    /// Reference one of the step's declared outputs
    pub fn output(&self, name: &str) -> CtflowResult<OutputRef> {
        if !self.outputs.iter().any(|o| o == name) {
            return Err(CtflowError::UnknownOutput {
                step: self.name.clone(),
                output: name.to_string(),
            });
        }
        Ok(OutputRef::new(&self.name, name))
    }
}

/// Container invocation for a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpSpec {
    /// Container image
    pub image: String,

    /// Entrypoint command
    #[serde(default)]
    pub command: Vec<String>,

    /// Arguments (may contain input placeholders)
    #[serde(default)]
    pub args: Vec<String>,
}

impl OpSpec {
    /// Placeholder the engine substitutes with an input value
    pub fn input_placeholder(name: &str) -> String {
        format!("{{{{inputs.parameters.{}}}}}", name)
    }
}

/// A named input binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedInput {
    pub name: String,
    pub binding: InputBinding,
}

/// Where an input value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputBinding {
    /// Value produced by an upstream step
    Upstream(OutputRef),

    /// Literal value fixed at build time
    Literal(String),
}

impl InputBinding {
    /// Bind a literal value
    pub fn literal(value: impl fmt::Display) -> Self {
        Self::Literal(value.to_string())
    }

    /// Bind an upstream output
    pub fn upstream(output: &OutputRef) -> Self {
        Self::Upstream(output.clone())
    }

    /// The upstream output this binding reads, if any
    pub fn upstream_ref(&self) -> Option<&OutputRef> {
        match self {
            Self::Upstream(r) => Some(r),
            Self::Literal(_) => None,
        }
    }
}

/// Reference to a named output of a step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    pub step: String,
    pub output: String,
}

impl OutputRef {
    pub fn new(step: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            output: output.into(),
        }
    }

    /// Workflow parameter name carrying this output
    pub fn parameter_name(&self) -> String {
        format!("{}-{}", self.step, self.output)
    }

    /// Build a condition comparing this output with a branch value
    pub fn equals(&self, expected: BranchValue) -> Condition {
        Condition {
            operand: self.clone(),
            expected,
        }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.step, self.output)
    }
}

/// Boolean-like string emitted by a decision step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchValue {
    /// Exactly the string `"True"`
    True,
    /// Exactly the string `"False"`
    False,
    /// Anything else
    Unhandled,
}

impl BranchValue {
    /// Classify a raw output value. Matching is exact and case-sensitive.
    pub fn from_output(value: &str) -> Self {
        match value {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unhandled,
        }
    }

    /// Literal compared against, `None` for [`BranchValue::Unhandled`]
    pub fn literal(&self) -> Option<&'static str> {
        match self {
            Self::True => Some("True"),
            Self::False => Some("False"),
            Self::Unhandled => None,
        }
    }

    /// The opposite branch of a boolean decision
    pub fn complement(&self) -> Option<Self> {
        match self {
            Self::True => Some(Self::False),
            Self::False => Some(Self::True),
            Self::Unhandled => None,
        }
    }
}

impl fmt::Display for BranchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unhandled => write!(f, "<unhandled>"),
        }
    }
}

/// Gate on an upstream output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub operand: OutputRef,
    pub expected: BranchValue,
}

impl Condition {
    /// Whether a group with this condition would run for `value`
    pub fn matches(&self, value: &str) -> bool {
        BranchValue::from_output(value) == self.expected
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected.literal() {
            Some(lit) => write!(f, "{} == \"{}\"", self.operand, lit),
            None => write!(f, "{} not in (\"True\", \"False\")", self.operand),
        }
    }
}

/// A group of steps and nested groups that run only when a condition holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionGroup {
    /// Unique id, `condition-<name>-<n>`
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Gate for the whole group
    pub condition: Condition,

    /// Enclosing group id
    #[serde(default)]
    pub parent: Option<String>,
}

/// Per-step resource limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default)]
    pub gpu: Option<u32>,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

impl ResourceLimits {
    pub fn is_empty(&self) -> bool {
        self.gpu.is_none() && self.cpu.is_none() && self.memory.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op() -> OpSpec {
        OpSpec {
            image: "busybox".into(),
            command: vec!["true".into()],
            args: vec![],
        }
    }

    #[test]
    fn test_branch_value_is_exact() {
        assert_eq!(BranchValue::from_output("True"), BranchValue::True);
        assert_eq!(BranchValue::from_output("False"), BranchValue::False);
        assert_eq!(BranchValue::from_output("true"), BranchValue::Unhandled);
        assert_eq!(BranchValue::from_output(" True"), BranchValue::Unhandled);
        assert_eq!(BranchValue::from_output(""), BranchValue::Unhandled);
    }

    #[test]
    fn test_condition_matches() {
        let flag = OutputRef::new("check", "flag");
        let when_true = flag.equals(BranchValue::True);
        let when_false = flag.equals(BranchValue::False);

        assert!(when_true.matches("True"));
        assert!(!when_false.matches("True"));

        // neither boolean branch runs for an unexpected value
        assert!(!when_true.matches("yes"));
        assert!(!when_false.matches("yes"));
        assert!(flag.equals(BranchValue::Unhandled).matches("yes"));
    }

    #[test]
    fn test_step_resource_setters() {
        let step = Step::new("train", op())
            .set_gpu_limit(1)
            .set_cpu_limit("3000m")
            .set_memory_limit("12G");

        assert_eq!(
            step.resources,
            Some(ResourceLimits {
                gpu: Some(1),
                cpu: Some("3000m".into()),
                memory: Some("12G".into()),
            })
        );
    }

    #[test]
    fn test_step_handle_rejects_undeclared_output() {
        let step = Step::new("check", op()).with_output("flag");
        let handle = StepHandle::new(&step);

        assert_eq!(handle.output("flag").unwrap(), OutputRef::new("check", "flag"));
        assert!(matches!(
            handle.output("missing"),
            Err(CtflowError::UnknownOutput { .. })
        ));
    }

    #[test]
    fn test_predecessors_deduplicates() {
        let upstream = Step::new("a", op()).with_output("x");
        let handle = StepHandle::new(&upstream);

        let step = Step::new("b", op())
            .with_input("x", InputBinding::upstream(&handle.output("x").unwrap()))
            .after(&handle);

        assert_eq!(step.predecessors(), vec!["a"]);
    }

    #[test]
    fn test_parameter_name() {
        let r = OutputRef::new("train", "target_checkpoints_path");
        assert_eq!(r.parameter_name(), "train-target_checkpoints_path");
        assert_eq!(OpSpec::input_placeholder("seed"), "{{inputs.parameters.seed}}");
    }
}
