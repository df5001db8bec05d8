pub mod builder;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A workflow diagram as the user declares it: the nodes plus a sparse
/// mapping from source nodes to their targets. The compiler turns this into
/// a full activity diagram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagram {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<Node>,
    pub transitions: Vec<Transition>,
}

/// Declared node kinds.
///
/// Action and Decision nodes are stored on the record under the node id.
/// `auto` optionally holds an expression evaluated against the record to
/// perform the action or take the decision automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NodeType {
    Initial,
    FlowFinal,
    WorkflowFinal,
    Merge,
    Fork,
    Join,
    Action {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto: Option<String>,
    },
    Decision {
        #[serde(default)]
        choices: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auto: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: NodeType,
}

/// Where a source node leads. A `None` target ends that branch without
/// ending the whole workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Target {
    Node(Option<String>),
    /// All targets are taken unconditionally.
    Parallel(Vec<Option<String>>),
    /// Choice label to target; only valid on decisions.
    Choices(BTreeMap<String, Option<String>>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    pub source: String,
    pub target: Target,
}
