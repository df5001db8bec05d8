use crate::dsl::{Diagram, NodeType, Target};
use crate::error::DiagramError;
use crate::nodes::NodeKind;
use crate::runtime::graph::{ActivityGraph, Edge, NodeId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// First compiler stage: declares the arena, flattens the sparse transition
/// mapping into explicit edges and closes every loose end with Initial or
/// WorkflowFinal nodes.
#[derive(Default)]
pub struct Expander;

impl Expander {
    pub fn new() -> Self {
        Self
    }

    pub fn expand(&self, diagram: &Diagram) -> Result<ActivityGraph, DiagramError> {
        if diagram.transitions.is_empty() {
            return Err(DiagramError::Empty(diagram.id.clone()));
        }

        let name = if diagram.name.is_empty() { &diagram.id } else { &diagram.name };
        let mut graph = ActivityGraph::new(&diagram.id, name);
        let ids = self.declare_nodes(diagram, &mut graph)?;

        self.flatten(diagram, &ids, &mut graph)?;
        self.insert_boundaries(&mut graph);

        debug!(
            diagram = %diagram.id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Expanded diagram"
        );
        Ok(graph)
    }

    fn declare_nodes(
        &self,
        diagram: &Diagram,
        graph: &mut ActivityGraph,
    ) -> Result<HashMap<String, NodeId>, DiagramError> {
        let mut ids = HashMap::new();
        for node in &diagram.nodes {
            if ids.contains_key(&node.id) {
                return Err(DiagramError::DuplicateNode(node.id.clone()));
            }
            let kind = match &node.kind {
                NodeType::Initial => NodeKind::Initial,
                NodeType::FlowFinal => NodeKind::FlowFinal,
                NodeType::WorkflowFinal => NodeKind::WorkflowFinal,
                NodeType::Merge => NodeKind::Merge,
                NodeType::Fork => NodeKind::Fork,
                NodeType::Join => NodeKind::Join,
                NodeType::Action { .. } => NodeKind::Action { field: node.id.clone() },
                NodeType::Decision { choices, .. } => {
                    if choices.is_empty() {
                        return Err(DiagramError::MissingChoices(node.id.clone()));
                    }
                    NodeKind::Decision {
                        field: node.id.clone(),
                        choices: choices.clone(),
                    }
                }
            };
            let id = graph.add_node(&node.id, node.label.clone(), kind);
            ids.insert(node.id.clone(), id);
        }
        Ok(ids)
    }

    fn flatten(
        &self,
        diagram: &Diagram,
        ids: &HashMap<String, NodeId>,
        graph: &mut ActivityGraph,
    ) -> Result<(), DiagramError> {
        let resolve = |name: &str| {
            ids.get(name)
                .copied()
                .ok_or_else(|| DiagramError::UnknownNode(name.to_string()))
        };

        let mut seen_sources = HashSet::new();
        for transition in &diagram.transitions {
            if !seen_sources.insert(transition.source.as_str()) {
                return Err(DiagramError::DuplicateSource(transition.source.clone()));
            }
            let source = resolve(&transition.source)?;

            // A missing target becomes a fresh FlowFinal per occurrence.
            let mut targets: Vec<(Option<&str>, Option<String>)> = Vec::new();
            match &transition.target {
                Target::Node(target) => targets.push((target.as_deref(), None)),
                Target::Parallel(many) => {
                    targets.extend(many.iter().map(|t| (t.as_deref(), None)));
                }
                Target::Choices(choices) => {
                    if !graph.node(source).kind.is_decision() {
                        return Err(DiagramError::ChoicesOnNonDecision(transition.source.clone()));
                    }
                    for (choice, target) in choices {
                        if choice.is_empty() {
                            return Err(DiagramError::EmptyChoice(transition.source.clone()));
                        }
                        targets.push((target.as_deref(), Some(choice.clone())));
                    }
                }
            }

            for (target, choice) in targets {
                let target = match target {
                    Some(name) => resolve(name)?,
                    None => graph.add_generated(NodeKind::FlowFinal),
                };
                let edge = Edge { source, target, choice };
                if !graph.edges.contains(&edge) {
                    graph.edges.push(edge);
                }
            }
        }
        Ok(())
    }

    fn insert_boundaries(&self, graph: &mut ActivityGraph) {
        let snapshot = graph.edges.clone();
        for edge in snapshot {
            let source = graph.node(edge.source);
            if !matches!(source.kind, NodeKind::Initial) && graph.incoming(edge.source) == 0 {
                let initial = graph.add_generated(NodeKind::Initial);
                graph.connect(initial, edge.source, None);
            }

            let target = graph.node(edge.target);
            let terminal = matches!(target.kind, NodeKind::WorkflowFinal | NodeKind::FlowFinal);
            if !terminal && graph.outgoing(edge.target) == 0 {
                let end = graph.add_generated(NodeKind::WorkflowFinal);
                graph.connect(edge.target, end, None);
            }
        }
    }
}
