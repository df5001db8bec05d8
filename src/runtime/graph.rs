use crate::nodes::NodeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a node inside an [`ActivityGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One end of an edge as seen from a node: the node on the other side and
/// the choice label carried by the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub node: NodeId,
    pub choice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub choice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    /// Declared id, or a generated one for nodes inserted by the compiler.
    pub name: String,
    pub label: Option<String>,
    pub kind: NodeKind,
    pub generated: bool,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl GraphNode {
    pub fn display_name(&self) -> String {
        let base = self.label.as_deref().unwrap_or(&self.name);
        if self.kind.is_decision() {
            format!("{}?", base)
        } else {
            base.to_string()
        }
    }
}

/// Compiled activity diagram: an arena of nodes plus the edge list that
/// connects them. Immutable once the compiler hands it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityGraph {
    pub id: String,
    pub name: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
}

impl ActivityGraph {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, name: &str, label: Option<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(GraphNode {
            id,
            name: name.to_string(),
            label,
            kind,
            generated: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        id
    }

    /// Adds a compiler-inserted node. Names are derived from the arena
    /// position so that compiling the same declaration twice gives the same
    /// names.
    pub fn add_generated(&mut self, kind: NodeKind) -> NodeId {
        let mut name = format!("_{}{}", kind.name(), self.nodes.len());
        while self.find(&name).is_some() {
            name.push('_');
        }
        let id = self.add_node(&name, None, kind);
        self.nodes[id.0].generated = true;
        id
    }

    pub fn connect(&mut self, source: NodeId, target: NodeId, choice: Option<String>) {
        self.edges.push(Edge { source, target, choice });
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn find(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Node backing the given record field.
    pub fn field_node(&self, field: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.kind.field() == Some(field))
    }

    pub fn initials(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Initial))
            .map(|n| n.id)
    }

    pub fn workflow_finals(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::WorkflowFinal))
            .map(|n| n.id)
    }

    pub fn incoming(&self, id: NodeId) -> usize {
        self.edges.iter().filter(|e| e.target == id).count()
    }

    pub fn outgoing(&self, id: NodeId) -> usize {
        self.edges.iter().filter(|e| e.source == id).count()
    }

    /// Drops nodes that no edge touches and renumbers the rest, keeping
    /// their relative order. Returns the names of the dropped nodes.
    pub fn compact(&mut self) -> Vec<String> {
        let mut used = vec![false; self.nodes.len()];
        for edge in &self.edges {
            used[edge.source.0] = true;
            used[edge.target.0] = true;
        }

        let mut remap = vec![None; self.nodes.len()];
        let mut kept = Vec::with_capacity(self.nodes.len());
        let mut dropped = Vec::new();
        for (old, mut node) in std::mem::take(&mut self.nodes).into_iter().enumerate() {
            if used[old] {
                let new_id = NodeId(kept.len());
                remap[old] = Some(new_id);
                node.id = new_id;
                kept.push(node);
            } else {
                dropped.push(node.name);
            }
        }
        self.nodes = kept;

        for edge in &mut self.edges {
            // every edge endpoint is marked used above
            edge.source = remap[edge.source.0].unwrap_or(edge.source);
            edge.target = remap[edge.target.0].unwrap_or(edge.target);
        }
        dropped
    }

    /// Resolves per-node inputs and outputs from the edge list.
    pub fn link(&mut self) {
        for node in &mut self.nodes {
            node.inputs.clear();
            node.outputs.clear();
        }
        for edge in &self.edges {
            self.nodes[edge.target.0].inputs.push(Port {
                node: edge.source,
                choice: edge.choice.clone(),
            });
            self.nodes[edge.source.0].outputs.push(Port {
                node: edge.target,
                choice: edge.choice.clone(),
            });
        }
    }
}
