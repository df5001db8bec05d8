use crate::runtime::record::Record;
use anyhow::{Result, anyhow};
use evalexpr::{
    ContextWithMutableVariables, DefaultNumericTypes, HashMapContext, Node as EvalNode,
    build_operator_tree,
};
use serde_json::Value;
use std::fmt::{self, Debug};

/// Performs an action automatically. Returning `true` marks the action done.
///
/// May be called on every save until the action is done, so it has to be
/// idempotent.
pub trait ActionHandler: Send + Sync + Debug {
    fn run(&self, record: &dyn Record) -> Result<bool>;
}

/// Takes a decision automatically. `None` leaves the decision to a human.
pub trait DecisionHandler: Send + Sync + Debug {
    fn decide(&self, record: &dyn Record) -> Result<Option<String>>;
}

/// Action handler backed by a closure.
pub struct FnAction<F>(pub F);

impl<F> Debug for FnAction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnAction")
    }
}

impl<F> FnAction<F>
where
    F: Fn(&dyn Record) -> Result<bool> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ActionHandler for FnAction<F>
where
    F: Fn(&dyn Record) -> Result<bool> + Send + Sync,
{
    fn run(&self, record: &dyn Record) -> Result<bool> {
        (self.0)(record)
    }
}

/// Decision handler backed by a closure.
pub struct FnDecision<F>(pub F);

impl<F> Debug for FnDecision<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnDecision")
    }
}

impl<F> FnDecision<F>
where
    F: Fn(&dyn Record) -> Result<Option<String>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> DecisionHandler for FnDecision<F>
where
    F: Fn(&dyn Record) -> Result<Option<String>> + Send + Sync,
{
    fn decide(&self, record: &dyn Record) -> Result<Option<String>> {
        (self.0)(record)
    }
}

/// Action that is done as soon as a boolean expression over the record
/// fields holds, e.g. `amount < 100`.
#[derive(Debug)]
pub struct ExpressionAction {
    expression: EvalNode,
    raw: String,
}

impl ExpressionAction {
    pub fn new(expression: &str) -> Result<Self> {
        let compiled = build_operator_tree::<DefaultNumericTypes>(expression)
            .map_err(|e| anyhow!("Invalid action expression '{}': {}", expression, e))?;
        Ok(Self {
            expression: compiled,
            raw: expression.to_string(),
        })
    }
}

impl ActionHandler for ExpressionAction {
    fn run(&self, record: &dyn Record) -> Result<bool> {
        let ctx = eval_context(record);
        self.expression
            .eval_boolean_with_context(&ctx)
            .map_err(|e| anyhow!("Eval failed for action '{}': {}", self.raw, e))
    }
}

/// Decision taken by an expression yielding the choice label, e.g.
/// `if(amount > 1000, "manager", "clerk")`. An empty result defers.
#[derive(Debug)]
pub struct ExpressionDecision {
    expression: EvalNode,
    raw: String,
}

impl ExpressionDecision {
    pub fn new(expression: &str) -> Result<Self> {
        let compiled = build_operator_tree::<DefaultNumericTypes>(expression)
            .map_err(|e| anyhow!("Invalid decision expression '{}': {}", expression, e))?;
        Ok(Self {
            expression: compiled,
            raw: expression.to_string(),
        })
    }
}

impl DecisionHandler for ExpressionDecision {
    fn decide(&self, record: &dyn Record) -> Result<Option<String>> {
        let ctx = eval_context(record);
        let value = self
            .expression
            .eval_with_context(&ctx)
            .map_err(|e| anyhow!("Eval failed for decision '{}': {}", self.raw, e))?;
        match value {
            evalexpr::Value::String(s) if s.is_empty() => Ok(None),
            evalexpr::Value::String(s) => Ok(Some(s)),
            evalexpr::Value::Boolean(b) => Ok(Some(b.to_string())),
            evalexpr::Value::Empty => Ok(None),
            other => Err(anyhow!(
                "Decision '{}' must evaluate to a string, got {:?}",
                self.raw,
                other
            )),
        }
    }
}

fn eval_context(record: &dyn Record) -> HashMapContext<DefaultNumericTypes> {
    let mut eval_ctx = HashMapContext::<DefaultNumericTypes>::new();
    for (k, v) in record.fields() {
        let eval_val = match v {
            Value::String(s) => Some(evalexpr::Value::String(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(evalexpr::Value::Int(i))
                } else {
                    n.as_f64().map(evalexpr::Value::Float)
                }
            }
            Value::Bool(b) => Some(evalexpr::Value::Boolean(b)),
            Value::Null => Some(evalexpr::Value::Empty),
            _ => None,
        };
        if let Some(ev) = eval_val {
            let _ = eval_ctx.set_value(k, ev);
        }
    }
    eval_ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::record::MemoryRecord;

    #[test]
    fn expression_action_reads_record_fields() {
        let action = ExpressionAction::new("amount < 100").unwrap();
        let small = MemoryRecord::new("wf").with_field("amount", 20);
        let large = MemoryRecord::new("wf").with_field("amount", 500);
        assert!(action.run(&small).unwrap());
        assert!(!action.run(&large).unwrap());
    }

    #[test]
    fn expression_decision_returns_label() {
        let decision =
            ExpressionDecision::new("if(amount > 1000, \"manager\", \"clerk\")").unwrap();
        let record = MemoryRecord::new("wf").with_field("amount", 5000);
        assert_eq!(decision.decide(&record).unwrap(), Some("manager".to_string()));
    }

    #[test]
    fn expression_decision_defers_on_empty_string() {
        let decision = ExpressionDecision::new("\"\"").unwrap();
        let record = MemoryRecord::new("wf");
        assert_eq!(decision.decide(&record).unwrap(), None);
    }

    #[test]
    fn invalid_expression_is_rejected() {
        assert!(ExpressionAction::new("amount <").is_err());
    }
}
