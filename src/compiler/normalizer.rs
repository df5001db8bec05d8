use crate::nodes::NodeKind;
use crate::runtime::graph::{ActivityGraph, NodeId};
use tracing::debug;

/// Second compiler stage: makes implicit joins and splits explicit.
///
/// A node reached by several edges gets a Merge in front of it, a node with
/// several unconditional outgoing edges gets a Fork behind it.
#[derive(Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, graph: &mut ActivityGraph) {
        let merges = self.insert_merges(graph);
        let forks = self.insert_forks(graph);
        debug!(diagram = %graph.id, merges, forks, "Normalized diagram");
    }

    /// Returns the number of Merge nodes inserted.
    pub fn insert_merges(&self, graph: &mut ActivityGraph) -> usize {
        let mut inserted = 0;
        // Only nodes that existed before this pass are candidates.
        for index in 0..graph.nodes.len() {
            let node = NodeId(index);
            if matches!(graph.node(node).kind, NodeKind::Merge | NodeKind::Join) {
                continue;
            }
            if graph.incoming(node) <= 1 {
                continue;
            }

            let merge = graph.add_generated(NodeKind::Merge);
            for edge in graph.edges.iter_mut().filter(|e| e.target == node) {
                edge.target = merge;
            }
            graph.connect(merge, node, None);
            inserted += 1;
        }
        inserted
    }

    /// Returns the number of Fork nodes inserted.
    pub fn insert_forks(&self, graph: &mut ActivityGraph) -> usize {
        let mut inserted = 0;
        for index in 0..graph.nodes.len() {
            let node = NodeId(index);
            if matches!(graph.node(node).kind, NodeKind::Fork) {
                continue;
            }
            let unconditional = graph
                .edges
                .iter()
                .filter(|e| e.source == node && e.choice.is_none())
                .count();
            if unconditional <= 1 {
                continue;
            }

            let fork = graph.add_generated(NodeKind::Fork);
            for edge in graph
                .edges
                .iter_mut()
                .filter(|e| e.source == node && e.choice.is_none())
            {
                edge.source = fork;
            }
            graph.connect(node, fork, None);
            inserted += 1;
        }
        inserted
    }
}
