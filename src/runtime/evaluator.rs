use crate::compiler::core::Compiler;
use crate::dsl::{Diagram, NodeType};
use crate::error::WorkflowError;
use crate::nodes::NodeKind;
use crate::nodes::automation::{ActionHandler, DecisionHandler, ExpressionAction, ExpressionDecision};
use crate::runtime::graph::{ActivityGraph, NodeId};
use crate::runtime::record::{Record, choice, flag};
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

type Memo = Vec<Option<bool>>;

/// A registered workflow type: its compiled diagram plus the handlers that
/// perform actions and take decisions automatically.
///
/// Actions and decisions without a handler are manual: only the user sets
/// their record fields.
#[derive(Debug)]
pub struct Workflow {
    graph: ActivityGraph,
    actions: HashMap<String, Arc<dyn ActionHandler>>,
    decisions: HashMap<String, Arc<dyn DecisionHandler>>,
}

impl Workflow {
    pub fn new(graph: ActivityGraph) -> Self {
        Self {
            graph,
            actions: HashMap::new(),
            decisions: HashMap::new(),
        }
    }

    /// Compiles a declaration and attaches its `auto` expressions.
    pub fn from_diagram(diagram: &Diagram) -> Result<Self, WorkflowError> {
        let graph = Compiler::new().compile(diagram)?;
        let mut workflow = Self::new(graph);

        for node in &diagram.nodes {
            // nodes dropped by the compiler have nothing to automate
            if workflow.graph.field_node(&node.id).is_none() {
                continue;
            }
            match &node.kind {
                NodeType::Action { auto: Some(expr) } => {
                    let handler = ExpressionAction::new(expr).map_err(|source| WorkflowError::Handler {
                        what: "action",
                        field: node.id.clone(),
                        source,
                    })?;
                    workflow.register_action(&node.id, Arc::new(handler))?;
                }
                NodeType::Decision { auto: Some(expr), .. } => {
                    let handler = ExpressionDecision::new(expr).map_err(|source| WorkflowError::Handler {
                        what: "decision",
                        field: node.id.clone(),
                        source,
                    })?;
                    workflow.register_decision(&node.id, Arc::new(handler))?;
                }
                _ => {}
            }
        }
        Ok(workflow)
    }

    pub fn id(&self) -> &str {
        &self.graph.id
    }

    pub fn graph(&self) -> &ActivityGraph {
        &self.graph
    }

    pub fn register_action(
        &mut self,
        field: &str,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), WorkflowError> {
        match self.graph.field_node(field).map(|n| &n.kind) {
            Some(NodeKind::Action { .. }) => {
                self.actions.insert(field.to_string(), handler);
                Ok(())
            }
            _ => Err(WorkflowError::UnknownField {
                what: "action",
                field: field.to_string(),
            }),
        }
    }

    pub fn register_decision(
        &mut self,
        field: &str,
        handler: Arc<dyn DecisionHandler>,
    ) -> Result<(), WorkflowError> {
        match self.graph.field_node(field).map(|n| &n.kind) {
            Some(NodeKind::Decision { .. }) => {
                self.decisions.insert(field.to_string(), handler);
                Ok(())
            }
            _ => Err(WorkflowError::UnknownField {
                what: "decision",
                field: field.to_string(),
            }),
        }
    }

    /// Whether the node counts as done for this record. Never mutates.
    pub fn is_done(&self, node: NodeId, record: &dyn Record) -> bool {
        self.done_cached(node, record, &mut self.memo())
    }

    /// Whether some predecessor is done and, for decisions, took the edge
    /// leading here. This is what makes a node eligible.
    pub fn has_incoming(&self, node: NodeId, record: &dyn Record) -> bool {
        self.incoming_cached(node, record, &mut self.memo())
    }

    fn memo(&self) -> Memo {
        vec![None; self.graph.nodes.len()]
    }

    // Joins ask their inputs twice, so without the memo stacked fork/join
    // sections cost exponential time.
    fn done_cached(&self, node: NodeId, record: &dyn Record, memo: &mut Memo) -> bool {
        if let Some(done) = memo[node.0] {
            return done;
        }
        let n = self.graph.node(node);
        let done = match &n.kind {
            NodeKind::Initial => true,
            NodeKind::Action { field } => {
                flag(record, field) && self.incoming_cached(node, record, memo)
            }
            NodeKind::Decision { field, .. } => {
                choice(record, field).is_some() && self.incoming_cached(node, record, memo)
            }
            NodeKind::Join => {
                self.incoming_cached(node, record, memo)
                    && n.inputs.iter().all(|p| self.done_cached(p.node, record, memo))
            }
            NodeKind::Merge | NodeKind::Fork | NodeKind::FlowFinal | NodeKind::WorkflowFinal => {
                self.incoming_cached(node, record, memo)
            }
        };
        memo[node.0] = Some(done);
        done
    }

    fn incoming_cached(&self, node: NodeId, record: &dyn Record, memo: &mut Memo) -> bool {
        self.graph.node(node).inputs.iter().any(|port| {
            self.done_cached(port.node, record, memo)
                && match &self.graph.node(port.node).kind {
                    NodeKind::Decision { field, .. } => choice(record, field) == port.choice,
                    _ => true,
                }
        })
    }

    /// True once any WorkflowFinal node is reached.
    pub fn overall_done(&self, record: &dyn Record) -> bool {
        let mut memo = self.memo();
        self.graph
            .workflow_finals()
            .any(|id| self.done_cached(id, record, &mut memo))
    }

    /// Record fields of actions and decisions waiting for input.
    pub fn active_fields(&self, record: &dyn Record) -> Vec<String> {
        let mut memo = self.memo();
        let mut active = Vec::new();
        for n in &self.graph.nodes {
            let Some(field) = n.kind.field() else {
                continue;
            };
            if !self.done_cached(n.id, record, &mut memo)
                && self.incoming_cached(n.id, record, &mut memo)
            {
                active.push(field.to_string());
            }
        }
        active
    }

    /// Done flag of every node, indexed by [`NodeId`].
    pub fn done_nodes(&self, record: &dyn Record) -> Vec<bool> {
        let mut memo = self.memo();
        self.graph
            .nodes
            .iter()
            .map(|n| self.done_cached(n.id, record, &mut memo))
            .collect()
    }

    /// Runs automatic actions and decisions until nothing changes any more.
    /// Returns whether any field was written. Does nothing on a cancelled
    /// record. Handler errors are returned as they occur; fields written
    /// earlier in the same call stay written.
    pub fn advance(&self, record: &mut dyn Record, run_actions: bool) -> Result<bool, WorkflowError> {
        if record.cancelled().is_some() {
            debug!(workflow = %self.graph.id, "Workflow cancelled, not advancing");
            return Ok(false);
        }

        let mut changed_any = false;
        let mut pass = 0;
        loop {
            pass += 1;
            let changed = self.advance_pass(record, run_actions)?;
            debug!(workflow = %self.graph.id, pass, changed, "Advance pass finished");
            if !changed {
                break;
            }
            changed_any = true;
        }
        Ok(changed_any)
    }

    fn advance_pass(&self, record: &mut dyn Record, run_actions: bool) -> Result<bool, WorkflowError> {
        let mut changed = false;
        let mut visited = vec![false; self.graph.nodes.len()];
        let mut memo = self.memo();
        let mut queue: VecDeque<NodeId> = self.graph.initials().collect();

        while let Some(id) = queue.pop_front() {
            if visited[id.0] {
                continue;
            }
            visited[id.0] = true;
            let node = self.graph.node(id);

            if !self.done_cached(id, &*record, &mut memo) {
                let wrote = match &node.kind {
                    NodeKind::Action { field } => {
                        run_actions
                            && self.incoming_cached(id, &*record, &mut memo)
                            && !flag(&*record, field)
                            && self.run_action(field, record)?
                    }
                    NodeKind::Decision { field, choices } => {
                        self.incoming_cached(id, &*record, &mut memo)
                            && self.take_decision(field, choices, record)?
                    }
                    _ => false,
                };
                if wrote {
                    // later nodes see the new field value
                    memo.fill(None);
                    changed = true;
                }
            }

            queue.extend(node.outputs.iter().map(|p| p.node));
        }
        Ok(changed)
    }

    fn run_action(&self, field: &str, record: &mut dyn Record) -> Result<bool, WorkflowError> {
        let Some(handler) = self.actions.get(field) else {
            return Ok(false);
        };
        let current = flag(&*record, field);
        let result = handler.run(&*record).map_err(|source| WorkflowError::Handler {
            what: "action",
            field: field.to_string(),
            source,
        })?;
        if result == current {
            return Ok(false);
        }
        record
            .set_field(field, Value::Bool(result))
            .map_err(|source| WorkflowError::Field {
                field: field.to_string(),
                source,
            })?;
        info!(workflow = %self.graph.id, field, result, "Automatic action performed");
        Ok(true)
    }

    fn take_decision(
        &self,
        field: &str,
        choices: &[String],
        record: &mut dyn Record,
    ) -> Result<bool, WorkflowError> {
        let Some(handler) = self.decisions.get(field) else {
            return Ok(false);
        };
        let decision = handler.decide(&*record).map_err(|source| WorkflowError::Handler {
            what: "decision",
            field: field.to_string(),
            source,
        })?;
        let Some(decision) = decision else {
            return Ok(false);
        };
        if Some(&decision) == choice(&*record, field).as_ref() {
            return Ok(false);
        }
        if !choices.contains(&decision) {
            return Err(WorkflowError::InvalidChoice {
                field: field.to_string(),
                value: decision,
            });
        }
        record
            .set_field(field, Value::String(decision.clone()))
            .map_err(|source| WorkflowError::Field {
                field: field.to_string(),
                source,
            })?;
        info!(workflow = %self.graph.id, field, decision = %decision, "Automatic decision taken");
        Ok(true)
    }

    /// Stamps the cancellation time. Cancelled workflows never advance again.
    pub fn cancel(&self, record: &mut dyn Record) -> Result<(), WorkflowError> {
        if record.completed().is_some() {
            return Err(WorkflowError::AlreadyCompleted);
        }
        record.set_cancelled(Utc::now());
        info!(workflow = %self.graph.id, "Workflow cancelled");
        Ok(())
    }

    /// The state update a persistence layer runs around each write: advance,
    /// stamp completion once a final node is reached, advance again.
    pub fn save(&self, record: &mut dyn Record) -> Result<(), WorkflowError> {
        if record.started().is_none() {
            record.set_started(Utc::now());
        }
        self.advance(record, true)?;
        if record.completed().is_none() && record.cancelled().is_none() && self.overall_done(&*record) {
            record.set_completed(Utc::now());
            info!(workflow = %self.graph.id, "Workflow completed");
        }
        self.advance(record, true)?;
        Ok(())
    }
}
