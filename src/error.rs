use thiserror::Error;

/// Problems found while compiling a diagram declaration.
/// A workflow type whose diagram fails to compile cannot be registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiagramError {
    #[error("diagram '{0}' has no transitions")]
    Empty(String),

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("node '{0}' is used as a transition source more than once")]
    DuplicateSource(String),

    #[error("transition references unknown node: {0}")]
    UnknownNode(String),

    #[error("node '{0}' maps choices to targets but is not a decision")]
    ChoicesOnNonDecision(String),

    #[error("decision '{0}' needs a non-empty set of choices")]
    MissingChoices(String),

    #[error("empty choice label on transition from '{0}'")]
    EmptyChoice(String),

    #[error("{kind} node '{node}' has {inputs} input(s) and {outputs} output(s), expected {expected}")]
    Arity {
        node: String,
        kind: &'static str,
        inputs: usize,
        outputs: usize,
        expected: &'static str,
    },

    #[error("decision '{node}' declares choices {declared:?} but its outputs are labelled {labelled:?}")]
    ChoiceMismatch {
        node: String,
        declared: Vec<String>,
        labelled: Vec<Option<String>>,
    },

    #[error("diagram '{0}' has no initial node")]
    NoInitial(String),

    #[error("diagram '{0}' can never reach a workflow final node")]
    NoWorkflowFinal(String),

    #[error("node '{0}' lies on a cycle")]
    Cycle(String),
}

/// Errors raised while evaluating a workflow against a record.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow has already completed, cannot cancel")]
    AlreadyCompleted,

    #[error("workflow type not registered: {0}")]
    UnknownWorkflow(String),

    #[error("no {what} node backs record field '{field}'")]
    UnknownField { what: &'static str, field: String },

    #[error("decision '{field}' returned '{value}', which is not one of its choices")]
    InvalidChoice { field: String, value: String },

    #[error("failed to write field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("automatic {what} for '{field}' failed: {source}")]
    Handler {
        what: &'static str,
        field: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Diagram(#[from] DiagramError),
}
