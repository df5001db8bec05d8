use crate::dsl::{Diagram, Node, NodeType, Target, Transition};
use std::collections::BTreeMap;

pub struct DiagramBuilder {
    id: String,
    name: String,
    pub nodes: Vec<Node>, // public so tests can tamper with declarations
    transitions: Vec<Transition>,
}

impl DiagramBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            nodes: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    fn node(mut self, id: &str, kind: NodeType) -> Self {
        self.nodes.push(Node {
            id: id.to_string(),
            label: None,
            kind,
        });
        self
    }

    /// Sets the label of the most recently declared node.
    pub fn label(mut self, label: &str) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.label = Some(label.to_string());
        }
        self
    }

    pub fn initial(self, id: &str) -> Self {
        self.node(id, NodeType::Initial)
    }

    pub fn flow_final(self, id: &str) -> Self {
        self.node(id, NodeType::FlowFinal)
    }

    pub fn workflow_final(self, id: &str) -> Self {
        self.node(id, NodeType::WorkflowFinal)
    }

    pub fn merge(self, id: &str) -> Self {
        self.node(id, NodeType::Merge)
    }

    pub fn fork(self, id: &str) -> Self {
        self.node(id, NodeType::Fork)
    }

    pub fn join(self, id: &str) -> Self {
        self.node(id, NodeType::Join)
    }

    pub fn action(self, id: &str) -> Self {
        self.node(id, NodeType::Action { auto: None })
    }

    pub fn auto_action(self, id: &str, expression: &str) -> Self {
        self.node(
            id,
            NodeType::Action {
                auto: Some(expression.to_string()),
            },
        )
    }

    pub fn decision(self, id: &str, choices: &[&str]) -> Self {
        self.node(
            id,
            NodeType::Decision {
                choices: choices.iter().map(|c| c.to_string()).collect(),
                auto: None,
            },
        )
    }

    pub fn auto_decision(self, id: &str, choices: &[&str], expression: &str) -> Self {
        self.node(
            id,
            NodeType::Decision {
                choices: choices.iter().map(|c| c.to_string()).collect(),
                auto: Some(expression.to_string()),
            },
        )
    }

    fn transition(mut self, source: &str, target: Target) -> Self {
        self.transitions.push(Transition {
            source: source.to_string(),
            target,
        });
        self
    }

    pub fn connect(self, source: &str, target: &str) -> Self {
        self.transition(source, Target::Node(Some(target.to_string())))
    }

    /// Ends the branch after `source` without ending the workflow.
    pub fn terminate(self, source: &str) -> Self {
        self.transition(source, Target::Node(None))
    }

    pub fn parallel(self, source: &str, targets: &[&str]) -> Self {
        let targets = targets.iter().map(|t| Some(t.to_string())).collect();
        self.transition(source, Target::Parallel(targets))
    }

    pub fn choose(self, source: &str) -> ChoiceBuilder {
        ChoiceBuilder {
            diagram_builder: self,
            source: source.to_string(),
            choices: BTreeMap::new(),
        }
    }

    pub fn build(self) -> Diagram {
        Diagram {
            id: self.id,
            name: self.name,
            nodes: self.nodes,
            transitions: self.transitions,
        }
    }
}

pub struct ChoiceBuilder {
    diagram_builder: DiagramBuilder,
    source: String,
    choices: BTreeMap<String, Option<String>>,
}

impl ChoiceBuilder {
    pub fn when(mut self, choice: &str, target: &str) -> Self {
        self.choices
            .insert(choice.to_string(), Some(target.to_string()));
        self
    }

    /// The branch taken on `choice` ends without ending the workflow.
    pub fn end_when(mut self, choice: &str) -> Self {
        self.choices.insert(choice.to_string(), None);
        self
    }

    pub fn build(self) -> DiagramBuilder {
        let source = self.source;
        self.diagram_builder
            .transition(&source, Target::Choices(self.choices))
    }
}
