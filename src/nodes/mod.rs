pub mod automation;

use serde::{Deserialize, Serialize};

/// Kind of a vertex in a compiled activity diagram.
///
/// Action and Decision nodes are backed by a record field of the same name:
/// a boolean for actions, a nullable choice label for decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum NodeKind {
    Initial,
    FlowFinal,
    WorkflowFinal,
    Merge,
    Fork,
    Join,
    Action { field: String },
    Decision { field: String, choices: Vec<String> },
}

/// Allowed number of edges on one side of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exactly(usize),
    AtLeast(usize),
    MoreThan(usize),
}

impl Bound {
    pub fn allows(self, count: usize) -> bool {
        match self {
            Bound::Exactly(n) => count == n,
            Bound::AtLeast(n) => count >= n,
            Bound::MoreThan(n) => count > n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub inputs: Bound,
    pub outputs: Bound,
    /// Human readable form, used in configuration errors.
    pub expected: &'static str,
}

impl Arity {
    pub fn allows(&self, inputs: usize, outputs: usize) -> bool {
        self.inputs.allows(inputs) && self.outputs.allows(outputs)
    }
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Initial => "initial",
            NodeKind::FlowFinal => "flow_final",
            NodeKind::WorkflowFinal => "workflow_final",
            NodeKind::Merge => "merge",
            NodeKind::Fork => "fork",
            NodeKind::Join => "join",
            NodeKind::Action { .. } => "action",
            NodeKind::Decision { .. } => "decision",
        }
    }

    /// Record field backing this node, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            NodeKind::Action { field } | NodeKind::Decision { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(self, NodeKind::Decision { .. })
    }

    pub fn arity(&self) -> Arity {
        use Bound::*;
        match self {
            NodeKind::Initial => Arity {
                inputs: Exactly(0),
                outputs: Exactly(1),
                expected: "no inputs and exactly one output",
            },
            NodeKind::FlowFinal | NodeKind::WorkflowFinal => Arity {
                inputs: Exactly(1),
                outputs: Exactly(0),
                expected: "exactly one input and no outputs",
            },
            NodeKind::Merge | NodeKind::Join => Arity {
                inputs: AtLeast(1),
                outputs: Exactly(1),
                expected: "at least one input and exactly one output",
            },
            NodeKind::Fork => Arity {
                inputs: Exactly(1),
                outputs: AtLeast(1),
                expected: "exactly one input and at least one output",
            },
            NodeKind::Action { .. } => Arity {
                inputs: Exactly(1),
                outputs: Exactly(1),
                expected: "exactly one input and exactly one output",
            },
            NodeKind::Decision { .. } => Arity {
                inputs: Exactly(1),
                outputs: MoreThan(1),
                expected: "exactly one input and more than one output",
            },
        }
    }

    /// Graphviz attributes describing the shape of this kind of node.
    pub fn dot_attrs(&self, inputs: usize, outputs: usize) -> Vec<(&'static str, String)> {
        let bar_width = |edges: usize| ((edges as f64) * 1.5).floor().to_string();
        match self {
            NodeKind::Action { .. } => vec![("shape", "box".into()), ("style", "rounded".into())],
            NodeKind::Decision { .. } => vec![
                ("shape", "diamond".into()),
                ("label", "\"\"".into()),
                ("fixedsize", "TRUE".into()),
                ("width", "0.5".into()),
                ("height", "0.5".into()),
            ],
            NodeKind::Merge => vec![
                ("shape", "diamond".into()),
                ("label", "\"\"".into()),
                ("fixedsize", "TRUE".into()),
                ("width", "0.5".into()),
                ("height", "0.5".into()),
            ],
            NodeKind::Initial => vec![
                ("shape", "circle".into()),
                ("label", "\"\"".into()),
                ("style", "filled".into()),
                ("fillcolor", "black".into()),
                ("fixedsize", "shape".into()),
                ("width", "0.2".into()),
                ("height", "0.2".into()),
            ],
            NodeKind::FlowFinal => vec![
                ("shape", "circle".into()),
                ("label", "\"X\"".into()),
                ("fixedsize", "shape".into()),
                ("width", "0.2".into()),
                ("height", "0.2".into()),
            ],
            NodeKind::WorkflowFinal => vec![
                ("shape", "doublecircle".into()),
                ("label", "\"\"".into()),
                ("style", "filled".into()),
                ("fillcolor", "black".into()),
                ("fixedsize", "shape".into()),
                ("width", "0.2".into()),
                ("height", "0.2".into()),
            ],
            NodeKind::Fork => vec![
                ("shape", "box".into()),
                ("label", "\"\"".into()),
                ("style", "\"filled, rounded\"".into()),
                ("fillcolor", "black".into()),
                ("width", bar_width(outputs)),
                ("height", "0.1".into()),
            ],
            NodeKind::Join => vec![
                ("shape", "box".into()),
                ("label", "\"\"".into()),
                ("style", "\"filled, rounded\"".into()),
                ("fillcolor", "black".into()),
                ("width", bar_width(inputs)),
                ("height", "0.1".into()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_needs_more_than_one_output() {
        let kind = NodeKind::Decision {
            field: "approved".into(),
            choices: vec!["yes".into(), "no".into()],
        };
        assert!(!kind.arity().allows(1, 1));
        assert!(kind.arity().allows(1, 2));
        assert!(!kind.arity().allows(2, 2));
    }

    #[test]
    fn merge_and_join_share_arity() {
        assert_eq!(NodeKind::Merge.arity(), NodeKind::Join.arity());
        assert!(NodeKind::Join.arity().allows(3, 1));
        assert!(!NodeKind::Join.arity().allows(0, 1));
    }

    #[test]
    fn fork_bar_grows_with_outputs() {
        let attrs = NodeKind::Fork.dot_attrs(1, 3);
        let width = attrs.iter().find(|(k, _)| *k == "width").map(|(_, v)| v.as_str());
        assert_eq!(width, Some("4"));
    }
}
