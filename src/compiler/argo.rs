// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! Argo Workflows compiler
//!
//! Emits one DAG template for the pipeline root, one per condition group and
//! one container template per step. Outputs consumed across group boundaries
//! are threaded through group input parameters.

use serde::Serialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::Compiler;
use crate::errors::CtflowError;
use crate::pipeline::{
    BranchValue, ConditionGroup, DagBuilder, InputBinding, OutputRef, Pipeline, Step,
};

/// Argo API version of the emitted document
pub const API_VERSION: &str = "argoproj.io/v1alpha1";

/// Directory the ops write their output parameters to
const OUTPUTS_DIR: &str = "/tmp/outputs";

/// Annotation carrying a JSON summary of the pipeline
const PIPELINE_SPEC_ANNOTATION: &str = "pipelines.kubeflow.org/pipeline_spec";

/// Service account of the compiled workflow, before overrides
const COMPILED_SERVICE_ACCOUNT: &str = "pipeline-runner";

/// Compiler producing an Argo `Workflow`
#[derive(Debug, Clone, Default)]
pub struct ArgoCompiler;

impl ArgoCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for ArgoCompiler {
    fn compile(&self, pipeline: &Pipeline) -> Result<Value, CtflowError> {
        // Reject cycles and dangling edges before rendering anything
        DagBuilder::build(pipeline)?;

        let ctx = CompileContext::new(pipeline);

        let mut templates = Vec::with_capacity(1 + pipeline.groups.len() + pipeline.steps.len());
        templates.push(ctx.dag_template(None, &pipeline.name));
        for group in &pipeline.groups {
            templates.push(ctx.dag_template(Some(group), &group.id));
        }
        for step in &pipeline.steps {
            templates.push(container_template(step));
        }
        templates.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(templates = templates.len(), "compiled argo templates");

        let summary = serde_json::to_string(&PipelineSummary {
            name: &pipeline.name,
            description: pipeline.description.as_deref(),
        })?;

        let workflow = Workflow {
            api_version: API_VERSION,
            kind: "Workflow",
            metadata: WorkflowMetadata {
                generate_name: format!("{}-", pipeline.name),
                annotations: BTreeMap::from([(PIPELINE_SPEC_ANNOTATION.to_string(), summary)]),
            },
            spec: WorkflowSpec {
                entrypoint: pipeline.name.clone(),
                templates,
                arguments: Arguments { parameters: vec![] },
                service_account_name: COMPILED_SERVICE_ACCOUNT.to_string(),
            },
        };

        serde_yaml::to_value(&workflow).map_err(Into::into)
    }
}

/// Precomputed lookups shared by every template
struct CompileContext<'a> {
    pipeline: &'a Pipeline,
    /// task name -> names of sibling tasks it waits for
    dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl<'a> CompileContext<'a> {
    fn new(pipeline: &'a Pipeline) -> Self {
        let mut ctx = Self {
            pipeline,
            dependencies: BTreeMap::new(),
        };

        for step in &pipeline.steps {
            let chain = pipeline.step_chain(step);
            for dep in step.predecessors() {
                ctx.attach(dep, &chain, &step.name);
            }
        }

        for group in &pipeline.groups {
            let chain = pipeline.group_chain(Some(&group.id));
            ctx.attach(&group.condition.operand.step, &chain, &group.id);
        }

        ctx
    }

    /// Record `producer -> consumer` at their lowest common enclosing scope.
    ///
    /// The dependency is placed between the two sibling tasks of that scope
    /// which contain the producer and the consumer respectively.
    fn attach(&mut self, producer: &str, consumer_chain: &[String], consumer: &str) {
        let Some(step) = self.pipeline.get_step(producer) else {
            return;
        };
        let producer_chain = self.pipeline.step_chain(step);

        let common = producer_chain
            .iter()
            .zip(consumer_chain)
            .take_while(|(a, b)| a == b)
            .count();

        let from = producer_chain
            .get(common)
            .cloned()
            .unwrap_or_else(|| producer.to_string());
        let to = consumer_chain
            .get(common)
            .cloned()
            .unwrap_or_else(|| consumer.to_string());

        if from != to {
            self.dependencies.entry(to).or_default().insert(from);
        }
    }

    /// Expression reading an output from inside the template of `scope`
    fn param_ref(&self, r: &OutputRef, scope: Option<&str>) -> String {
        let direct_child = self
            .pipeline
            .get_step(&r.step)
            .is_some_and(|p| p.group.as_deref() == scope);

        if direct_child {
            format!(
                "{{{{tasks.{}.outputs.parameters.{}}}}}",
                r.step,
                r.parameter_name()
            )
        } else {
            format!("{{{{inputs.parameters.{}}}}}", r.parameter_name())
        }
    }

    /// Outputs used inside a group but produced outside of it
    fn group_inputs(&self, group_id: &str) -> Vec<OutputRef> {
        let mut refs: BTreeMap<String, OutputRef> = BTreeMap::new();

        let produced_outside = |r: &OutputRef| {
            self.pipeline
                .get_step(&r.step)
                .map(|p| !self.pipeline.step_chain(p).iter().any(|g| g == group_id))
                .unwrap_or(false)
        };

        for step in &self.pipeline.steps {
            if !self.pipeline.step_chain(step).iter().any(|g| g == group_id) {
                continue;
            }
            for r in step.upstream_refs() {
                if produced_outside(r) {
                    refs.insert(r.parameter_name(), r.clone());
                }
            }
        }

        for group in &self.pipeline.groups {
            if group.id == group_id {
                continue;
            }
            let inside = self
                .pipeline
                .group_chain(Some(&group.id))
                .iter()
                .any(|g| g == group_id);
            if inside && produced_outside(&group.condition.operand) {
                let r = &group.condition.operand;
                refs.insert(r.parameter_name(), r.clone());
            }
        }

        refs.into_values().collect()
    }

    fn dependencies_of(&self, task: &str) -> Vec<String> {
        self.dependencies
            .get(task)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn when_expression(&self, group: &ConditionGroup) -> String {
        let value = self.param_ref(&group.condition.operand, group.parent.as_deref());
        match group.condition.expected.literal() {
            Some(lit) => format!("\"{}\" == \"{}\"", value, lit),
            None => format!(
                "\"{value}\" != \"{t}\" && \"{value}\" != \"{f}\"",
                value = value,
                t = BranchValue::True,
                f = BranchValue::False
            ),
        }
    }

    fn dag_template(&self, group: Option<&ConditionGroup>, name: &str) -> Template {
        let scope = group.map(|g| g.id.as_str());
        let mut tasks = Vec::new();

        for step in self.pipeline.steps_in(scope) {
            let parameters = step
                .inputs
                .iter()
                .map(|input| Parameter {
                    name: input.name.clone(),
                    value: Some(match &input.binding {
                        InputBinding::Literal(v) => v.clone(),
                        InputBinding::Upstream(r) => self.param_ref(r, scope),
                    }),
                    value_from: None,
                })
                .collect();

            tasks.push(DagTask {
                name: step.name.clone(),
                template: step.name.clone(),
                when: None,
                dependencies: self.dependencies_of(&step.name),
                arguments: Arguments::non_empty(parameters),
            });
        }

        for child in self.pipeline.groups_in(scope) {
            let parameters = self
                .group_inputs(&child.id)
                .iter()
                .map(|r| Parameter {
                    name: r.parameter_name(),
                    value: Some(self.param_ref(r, scope)),
                    value_from: None,
                })
                .collect();

            tasks.push(DagTask {
                name: child.id.clone(),
                template: child.id.clone(),
                when: Some(self.when_expression(child)),
                dependencies: self.dependencies_of(&child.id),
                arguments: Arguments::non_empty(parameters),
            });
        }

        tasks.sort_by(|a, b| a.name.cmp(&b.name));

        let inputs = group.and_then(|g| {
            let parameters = self
                .group_inputs(&g.id)
                .iter()
                .map(|r| Parameter::named(r.parameter_name()))
                .collect();
            Arguments::non_empty(parameters)
        });

        Template {
            name: name.to_string(),
            container: None,
            dag: Some(DagSpec { tasks }),
            inputs,
            outputs: None,
        }
    }
}

fn container_template(step: &Step) -> Template {
    let resources = step
        .resources
        .as_ref()
        .filter(|r| !r.is_empty())
        .map(|r| {
            let mut limits = BTreeMap::new();
            if let Some(cpu) = &r.cpu {
                limits.insert("cpu".to_string(), cpu.clone());
            }
            if let Some(memory) = &r.memory {
                limits.insert("memory".to_string(), memory.clone());
            }
            if let Some(gpu) = r.gpu {
                limits.insert("nvidia.com/gpu".to_string(), gpu.to_string());
            }
            Resources { limits }
        });

    let inputs = Arguments::non_empty(
        step.inputs
            .iter()
            .map(|i| Parameter::named(i.name.clone()))
            .collect(),
    );

    let outputs = Arguments::non_empty(
        step.outputs
            .iter()
            .map(|o| Parameter {
                name: OutputRef::new(&step.name, o).parameter_name(),
                value: None,
                value_from: Some(ValueFrom {
                    path: format!("{}/{}/data", OUTPUTS_DIR, o),
                }),
            })
            .collect(),
    );

    Template {
        name: step.name.clone(),
        container: Some(Container {
            image: step.op.image.clone(),
            command: step.op.command.clone(),
            args: step.op.args.clone(),
            resources,
        }),
        dag: None,
        inputs,
        outputs,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argo document model
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Workflow {
    api_version: &'static str,
    kind: &'static str,
    metadata: WorkflowMetadata,
    spec: WorkflowSpec,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowMetadata {
    generate_name: String,
    annotations: BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowSpec {
    entrypoint: String,
    templates: Vec<Template>,
    arguments: Arguments,
    service_account_name: String,
}

#[derive(Serialize)]
struct PipelineSummary<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Serialize)]
struct Template {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    container: Option<Container>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dag: Option<DagSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inputs: Option<Arguments>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outputs: Option<Arguments>,
}

#[derive(Serialize)]
struct Container {
    image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<Resources>,
}

#[derive(Serialize)]
struct Resources {
    limits: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct DagSpec {
    tasks: Vec<DagTask>,
}

#[derive(Serialize)]
struct DagTask {
    name: String,
    template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    when: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Arguments>,
}

#[derive(Serialize)]
struct Arguments {
    parameters: Vec<Parameter>,
}

impl Arguments {
    fn non_empty(parameters: Vec<Parameter>) -> Option<Self> {
        (!parameters.is_empty()).then_some(Self { parameters })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameter {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_from: Option<ValueFrom>,
}

impl Parameter {
    fn named(name: String) -> Self {
        Self {
            name,
            value: None,
            value_from: None,
        }
    }
}

#[derive(Serialize)]
struct ValueFrom {
    path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{
        continuous_training_pipeline, OpCatalog, TrainingParams, UnhandledBranchPolicy,
    };

    fn compiled(policy: UnhandledBranchPolicy) -> Value {
        let pipeline = continuous_training_pipeline(
            &TrainingParams::default(),
            &OpCatalog::default(),
            policy,
        )
        .unwrap();
        ArgoCompiler::new().compile(&pipeline).unwrap()
    }

    fn template<'v>(workflow: &'v Value, name: &str) -> &'v Value {
        workflow["spec"]["templates"]
            .as_sequence()
            .unwrap()
            .iter()
            .find(|t| t["name"].as_str() == Some(name))
            .unwrap_or_else(|| panic!("no template {}", name))
    }

    fn task<'v>(template: &'v Value, name: &str) -> &'v Value {
        template["dag"]["tasks"]
            .as_sequence()
            .unwrap()
            .iter()
            .find(|t| t["name"].as_str() == Some(name))
            .unwrap_or_else(|| panic!("no task {}", name))
    }

    fn names(value: &Value) -> Vec<&str> {
        value
            .as_sequence()
            .map(|s| s.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_document_shape() {
        let wf = compiled(UnhandledBranchPolicy::Skip);

        assert_eq!(wf["apiVersion"].as_str(), Some(API_VERSION));
        assert_eq!(wf["kind"].as_str(), Some("Workflow"));
        assert_eq!(
            wf["metadata"]["generateName"].as_str(),
            Some("continuous-training-pipeline-")
        );
        assert!(wf["metadata"]["annotations"][PIPELINE_SPEC_ANNOTATION]
            .as_str()
            .unwrap()
            .contains("\"name\":\"continuous-training-pipeline\""));
        assert_eq!(
            wf["spec"]["entrypoint"].as_str(),
            Some("continuous-training-pipeline")
        );
        assert_eq!(wf["spec"]["serviceAccountName"].as_str(), Some("pipeline-runner"));
        // 1 root + 4 groups + 9 steps
        assert_eq!(wf["spec"]["templates"].as_sequence().unwrap().len(), 14);
    }

    #[test]
    fn test_root_dag() {
        let wf = compiled(UnhandledBranchPolicy::Skip);
        let root = template(&wf, "continuous-training-pipeline");

        let tasks = root["dag"]["tasks"].as_sequence().unwrap();
        assert_eq!(tasks.len(), 3);

        let required = task(root, "condition-preprocess-required-1");
        assert_eq!(
            required["when"].as_str(),
            Some("\"{{tasks.check-preprocess-proceed.outputs.parameters.check-preprocess-proceed-is_preprocess_required}}\" == \"True\"")
        );
        assert_eq!(names(&required["dependencies"]), vec!["check-preprocess-proceed"]);

        let not_required = task(root, "condition-preprocess-not-required-4");
        assert!(not_required["when"].as_str().unwrap().ends_with("== \"False\""));
    }

    #[test]
    fn test_cross_group_parameters() {
        let wf = compiled(UnhandledBranchPolicy::Skip);
        let root = template(&wf, "continuous-training-pipeline");
        let required = task(root, "condition-preprocess-required-1");

        let args = required["arguments"]["parameters"].as_sequence().unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(
            args[0]["name"].as_str(),
            Some("check-preprocess-proceed-preprocess_required_slide_paths")
        );

        let group = template(&wf, "condition-preprocess-required-1");
        let preprocess = task(group, "data-preprocess");
        assert_eq!(
            preprocess["arguments"]["parameters"][0]["value"].as_str(),
            Some("{{inputs.parameters.check-preprocess-proceed-preprocess_required_slide_paths}}")
        );
        // the ordering edge to the decision step is satisfied by the group task
        assert!(preprocess.get("dependencies").is_none());

        let train = task(group, "train");
        assert_eq!(names(&train["dependencies"]), vec!["data-preprocess"]);

        let evaluate = task(group, "evaluate");
        assert_eq!(
            evaluate["arguments"]["parameters"][0]["value"].as_str(),
            Some("{{tasks.train.outputs.parameters.train-target_checkpoints_path}}")
        );
    }

    #[test]
    fn test_nested_group_wiring() {
        let wf = compiled(UnhandledBranchPolicy::Skip);
        let outer = template(&wf, "condition-preprocess-required-1");

        let exist = task(outer, "condition-exist-2");
        assert_eq!(names(&exist["dependencies"]), vec!["check-deployable"]);
        assert_eq!(
            exist["arguments"]["parameters"][0]["value"].as_str(),
            Some("{{tasks.check-deployable.outputs.parameters.check-deployable-deployable_checkpoint_info}}")
        );

        let inner = template(&wf, "condition-exist-2");
        assert_eq!(
            inner["inputs"]["parameters"][0]["name"].as_str(),
            Some("check-deployable-deployable_checkpoint_info")
        );
        assert_eq!(
            names(&task(inner, "deploy")["dependencies"]),
            vec!["update-deploy-config"]
        );

        let not_exist = template(&wf, "condition-not-exist-3");
        assert!(not_exist.get("inputs").is_none());
    }

    #[test]
    fn test_container_templates() {
        let wf = compiled(UnhandledBranchPolicy::Skip);

        let train = template(&wf, "train");
        let limits = &train["container"]["resources"]["limits"];
        assert_eq!(limits["nvidia.com/gpu"].as_str(), Some("1"));
        assert_eq!(limits["cpu"].as_str(), Some("3000m"));
        assert_eq!(limits["memory"].as_str(), Some("12G"));
        assert_eq!(
            train["outputs"]["parameters"][0]["valueFrom"]["path"].as_str(),
            Some("/tmp/outputs/target_checkpoints_path/data")
        );

        let deploy = template(&wf, "deploy");
        assert!(deploy["container"].get("resources").is_none());
        assert!(deploy.get("inputs").is_none());
    }

    #[test]
    fn test_unhandled_guard_expression() {
        let wf = compiled(UnhandledBranchPolicy::Fail);
        let root = template(&wf, "continuous-training-pipeline");
        let guard = task(root, "condition-preprocess-unhandled-6");

        let when = guard["when"].as_str().unwrap();
        assert!(when.contains("!= \"True\" && "));
        assert!(when.ends_with("!= \"False\""));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let a = serde_yaml::to_string(&compiled(UnhandledBranchPolicy::Skip)).unwrap();
        let b = serde_yaml::to_string(&compiled(UnhandledBranchPolicy::Skip)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut pipeline = Pipeline::new("cyclic");
        let op = crate::pipeline::OpSpec {
            image: "busybox".into(),
            command: vec![],
            args: vec![],
        };
        let mut a = Step::new("a", op.clone());
        a.after = vec!["b".into()];
        let mut b = Step::new("b", op);
        b.after = vec!["a".into()];
        pipeline.steps = vec![a, b];

        let result = ArgoCompiler::new().compile(&pipeline);
        assert!(matches!(result, Err(CtflowError::CircularDependency { .. })));
    }
}
