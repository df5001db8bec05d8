use crate::compiler::expander::Expander;
use crate::compiler::normalizer::Normalizer;
use crate::dsl::Diagram;
use crate::error::DiagramError;
use crate::nodes::NodeKind;
use crate::runtime::graph::ActivityGraph;
use std::collections::{BTreeSet, VecDeque};
use tracing::{info, warn};

/// Turns a declared [`Diagram`] into a verified [`ActivityGraph`].
///
/// Compilation is deterministic: the same declaration always produces the
/// same nodes, names and edges.
#[derive(Default)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, diagram: &Diagram) -> Result<ActivityGraph, DiagramError> {
        // 1. Flatten and close loose ends
        let mut graph = Expander::new().expand(diagram)?;

        // 2. Explicit merges and forks
        Normalizer::new().normalize(&mut graph);

        // 3. Drop declared nodes no transition mentions
        let unused = graph.compact();
        for name in &unused {
            warn!(diagram = %diagram.id, node = %name, "Declared node is not part of any transition");
        }

        // 4. Resolve inputs/outputs and check structure
        graph.link();
        self.verify(&graph)?;

        info!(
            diagram = %graph.id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Compiled diagram"
        );
        Ok(graph)
    }

    pub fn verify(&self, graph: &ActivityGraph) -> Result<(), DiagramError> {
        for node in &graph.nodes {
            let arity = node.kind.arity();
            if !arity.allows(node.inputs.len(), node.outputs.len()) {
                return Err(DiagramError::Arity {
                    node: node.name.clone(),
                    kind: node.kind.name(),
                    inputs: node.inputs.len(),
                    outputs: node.outputs.len(),
                    expected: arity.expected,
                });
            }

            if let NodeKind::Decision { choices, .. } = &node.kind {
                let labelled: Vec<Option<String>> =
                    node.outputs.iter().map(|p| p.choice.clone()).collect();
                let declared: BTreeSet<&String> = choices.iter().collect();
                let used: BTreeSet<&String> = labelled.iter().flatten().collect();
                let all_labelled = labelled.iter().all(Option::is_some);
                if !all_labelled
                    || labelled.len() != choices.len()
                    || used.len() != labelled.len()
                    || declared != used
                {
                    return Err(DiagramError::ChoiceMismatch {
                        node: node.name.clone(),
                        declared: choices.clone(),
                        labelled,
                    });
                }
            }
        }

        if graph.initials().next().is_none() {
            return Err(DiagramError::NoInitial(graph.id.clone()));
        }
        if graph.workflow_finals().next().is_none() {
            return Err(DiagramError::NoWorkflowFinal(graph.id.clone()));
        }

        self.check_acyclic(graph)
    }

    // Kahn's algorithm; whatever is left over sits on a cycle.
    fn check_acyclic(&self, graph: &ActivityGraph) -> Result<(), DiagramError> {
        let mut in_degree: Vec<usize> = graph.nodes.iter().map(|n| n.inputs.len()).collect();
        let mut queue: VecDeque<usize> = (0..graph.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut visited = 0;

        while let Some(u) = queue.pop_front() {
            visited += 1;
            for port in &graph.nodes[u].outputs {
                let v = port.node.0;
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }

        if visited == graph.nodes.len() {
            return Ok(());
        }
        let culprit = in_degree
            .iter()
            .position(|&d| d > 0)
            .map(|i| graph.nodes[i].name.clone())
            .unwrap_or_default();
        Err(DiagramError::Cycle(culprit))
    }
}
