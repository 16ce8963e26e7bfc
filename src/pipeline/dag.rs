// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 ctflow contributors

//! DAG (Directed Acyclic Graph) builder for step dependencies
//!
//! A step depends on the steps it names in `after`, the steps whose outputs
//! it consumes, and the decision steps gating every group that encloses it.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use crate::errors::CtflowError;
use crate::pipeline::Pipeline;

/// Builder for step dependency DAGs
pub struct DagBuilder {
    graph: DiGraph<usize, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    index_to_name: HashMap<NodeIndex, String>,
}

impl DagBuilder {
    /// Create a new DAG builder
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_index: HashMap::new(),
            index_to_name: HashMap::new(),
        }
    }

    /// Build a DAG from a pipeline
    pub fn build(pipeline: &Pipeline) -> Result<Self, CtflowError> {
        let mut builder = Self::new();

        for (idx, step) in pipeline.steps.iter().enumerate() {
            if builder.name_to_index.contains_key(&step.name) {
                return Err(CtflowError::DuplicateStep {
                    step: step.name.clone(),
                });
            }
            let node = builder.graph.add_node(idx);
            builder.name_to_index.insert(step.name.clone(), node);
            builder.index_to_name.insert(node, step.name.clone());
        }

        for step in &pipeline.steps {
            let step_node = builder.name_to_index[&step.name];

            let mut deps: Vec<&str> = step.predecessors();

            // Implicit dependencies on the decisions gating this step
            for group_id in pipeline.step_chain(step) {
                if let Some(group) = pipeline.get_group(&group_id) {
                    if !deps.contains(&group.condition.operand.step.as_str()) {
                        deps.push(&group.condition.operand.step);
                    }
                }
            }

            for dep_name in deps {
                let dep_node = builder.name_to_index.get(dep_name).ok_or_else(|| {
                    CtflowError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep_name.to_string(),
                    }
                })?;

                if !builder.graph.contains_edge(*dep_node, step_node) {
                    builder.graph.add_edge(*dep_node, step_node, ());
                }
            }
        }

        builder.validate_acyclic()?;

        Ok(builder)
    }

    /// Validate that the graph is acyclic
    fn validate_acyclic(&self) -> Result<(), CtflowError> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let steps = self.find_cycle_members(cycle.node_id());
                Err(CtflowError::CircularDependency { steps })
            }
        }
    }

    /// Find the steps on a cycle through `start`
    fn find_cycle_members(&self, start: NodeIndex) -> Vec<String> {
        // Follow successors that lead back to `start` until a node repeats
        let mut path = vec![start];
        let mut seen = HashSet::from([start]);
        let mut current = start;

        loop {
            let next = self
                .graph
                .neighbors_directed(current, petgraph::Direction::Outgoing)
                .find(|n| petgraph::algo::has_path_connecting(&self.graph, *n, start, None));

            let Some(next) = next else {
                break;
            };
            if !seen.insert(next) {
                break;
            }
            path.push(next);
            current = next;
        }

        path.into_iter()
            .map(|n| self.index_to_name[&n].clone())
            .collect()
    }

    /// Get topologically sorted step indices
    pub fn topological_order(&self) -> Result<Vec<usize>, CtflowError> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|cycle| {
                let steps = self.find_cycle_members(cycle.node_id());
                CtflowError::CircularDependency { steps }
            })
    }

    /// Get topologically sorted step names
    pub fn topological_order_names(&self) -> Result<Vec<String>, CtflowError> {
        toposort(&self.graph, None)
            .map(|nodes| {
                nodes
                    .into_iter()
                    .map(|n| self.index_to_name[&n].clone())
                    .collect()
            })
            .map_err(|cycle| {
                let steps = self.find_cycle_members(cycle.node_id());
                CtflowError::CircularDependency { steps }
            })
    }

    /// Get dependencies for a step (steps that must run before it)
    pub fn dependencies(&self, step_name: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step_name)?;
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Incoming)
            .map(|n| self.index_to_name[&n].clone())
            .collect();
        deps.sort();
        Some(deps)
    }

    /// Check if step A depends (directly or transitively) on step B
    pub fn depends_on(&self, step_a: &str, step_b: &str) -> bool {
        let Some(node_a) = self.name_to_index.get(step_a) else {
            return false;
        };
        let Some(node_b) = self.name_to_index.get(step_b) else {
            return false;
        };

        petgraph::algo::has_path_connecting(&self.graph, *node_b, *node_a, None)
    }

    /// Generate Mermaid diagram of the DAG, one subgraph per condition group
    pub fn to_mermaid(&self, pipeline: &Pipeline) -> String {
        let mut out = String::from("graph TD\n");
        self.mermaid_scope(pipeline, None, 1, &mut out);

        for (from, to) in self.sorted_edges() {
            out.push_str(&format!("    {} --> {}\n", from, to));
        }

        out
    }

    fn mermaid_scope(&self, pipeline: &Pipeline, group: Option<&str>, depth: usize, out: &mut String) {
        let indent = "    ".repeat(depth);

        for step in pipeline.steps_in(group) {
            out.push_str(&format!("{}{}[{}]\n", indent, step.name, step.name));
        }

        for child in pipeline.groups_in(group) {
            out.push_str(&format!(
                "{}subgraph {}[\"{}\"]\n",
                indent,
                child.id,
                child.condition.to_string().replace('"', "'")
            ));
            self.mermaid_scope(pipeline, Some(child.id.as_str()), depth + 1, out);
            out.push_str(&format!("{}end\n", indent));
        }
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (from, to) in self.sorted_edges() {
            out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to));
        }

        // Add isolated nodes (no edges)
        let mut isolated: Vec<&String> = self
            .name_to_index
            .iter()
            .filter(|(_, node)| self.graph.neighbors_undirected(**node).count() == 0)
            .map(|(name, _)| name)
            .collect();
        isolated.sort();
        for name in isolated {
            out.push_str(&format!("    \"{}\";\n", name));
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of the execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> Result<String, CtflowError> {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (i, idx) in order.iter().enumerate() {
            let step = &pipeline.steps[*idx];
            let deps = self.dependencies(&step.name).unwrap_or_default();

            out.push_str(&format!("{}. {}", i + 1, step.name));

            if let Some(group) = step.group.as_deref().and_then(|g| pipeline.get_group(g)) {
                out.push_str(&format!(" (when {})", group.condition));
            }

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }

    fn sorted_edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(from, to)| {
                (
                    self.index_to_name[&from].as_str(),
                    self.index_to_name[&to].as_str(),
                )
            })
            .collect();
        edges.sort();
        edges
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}
