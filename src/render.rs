//! Graphviz output for compiled diagrams.
//!
//! [`workflow_as_dot`] draws the workflow type, [`record_as_dot`] colours the
//! same diagram with the progress of one record. [`dot_to_svg`] shells out to
//! the `dot` tool and never fails: problems are turned into a text fallback.

use crate::nodes::NodeKind;
use crate::runtime::evaluator::Workflow;
use crate::runtime::graph::{ActivityGraph, Edge, GraphNode};
use crate::runtime::record::{Record, choice};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use tracing::warn;

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn node_line(node: &GraphNode, extra: &[(&str, String)]) -> String {
    let mut attrs: BTreeMap<&str, String> = BTreeMap::new();
    attrs.insert("label", quote(&node.display_name()));
    attrs.insert("tooltip", quote(&node.display_name()));
    for (k, v) in node.kind.dot_attrs(node.inputs.len(), node.outputs.len()) {
        attrs.insert(k, v);
    }
    if node.kind.is_decision() {
        attrs.insert("xlabel", quote(&node.display_name()));
    }
    for (k, v) in extra {
        attrs.insert(k, v.clone());
    }
    let attrs: Vec<String> = attrs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}[{}]", node.id, attrs.join(", "))
}

fn choice_label(edge: &Edge) -> Option<String> {
    edge.choice
        .as_ref()
        .map(|c| format!("taillabel = {} labeldistance = 3.0", quote(&format!("[{}]", c))))
}

fn header(graph: &ActivityGraph, attrs: &[(&str, &str)]) -> Vec<String> {
    let mut settings: BTreeMap<&str, &str> = BTreeMap::new();
    settings.insert("splines", "ortho");
    for (k, v) in attrs {
        settings.insert(k, v);
    }
    let mut lines = vec![format!("digraph {} {{", quote(&graph.name))];
    lines.extend(settings.iter().map(|(k, v)| format!("{}={}", k, v)));
    lines.push("graph[bgcolor=\"#ffffff00\" ranksep=1]".to_string());
    lines.push("edge[arrowhead=open]".to_string());
    lines
}

/// Dot source for the workflow type, independent of any record.
pub fn workflow_as_dot(graph: &ActivityGraph, attrs: &[(&str, &str)]) -> String {
    let mut dot = header(graph, attrs);
    dot.extend(graph.nodes.iter().map(|n| node_line(n, &[])));
    for edge in &graph.edges {
        let attrs = choice_label(edge).unwrap_or_default();
        dot.push(format!("{} -> {}[{}]", edge.source, edge.target, attrs));
    }
    dot.push("}".to_string());
    dot.join("\n")
}

/// Dot source highlighting what is done (green) and what is waiting for
/// input (orange) on the given record.
pub fn record_as_dot(workflow: &Workflow, record: &dyn Record, attrs: &[(&str, &str)]) -> String {
    let graph = workflow.graph();
    let mut settings = vec![("overlap", "true")];
    settings.extend_from_slice(attrs);
    let mut dot = header(graph, &settings);
    let done_nodes = workflow.done_nodes(record);

    for node in &graph.nodes {
        let done = done_nodes[node.id.0];
        let color = if done {
            "lightgreen"
        } else if workflow.has_incoming(node.id, record) {
            "orange"
        } else {
            "black"
        };
        let fill = if done { "lightgreen" } else { "lightgrey" };
        dot.push(node_line(
            node,
            &[("fillcolor", fill.to_string()), ("color", color.to_string())],
        ));
    }

    for edge in &graph.edges {
        let source = graph.node(edge.source);
        let target = graph.node(edge.target);
        let taken = match &source.kind {
            NodeKind::Decision { field, .. } => choice(record, field) == edge.choice,
            _ => done_nodes[source.id.0] && done_nodes[target.id.0],
        };
        let mut attrs = Vec::new();
        if let Some(label) = choice_label(edge) {
            attrs.push(label);
        }
        attrs.push(format!("color={}", if taken { "lightgreen" } else { "black" }));
        if matches!(target.kind, NodeKind::Join) {
            attrs.push("headport=n".to_string());
        }
        if matches!(target.kind, NodeKind::Fork) {
            attrs.push("tailport=s".to_string());
        }
        dot.push(format!("{} -> {}[{}]", edge.source, edge.target, attrs.join(" ")));
    }

    dot.push("}".to_string());
    dot.join("\n")
}

/// Result of running the external layout tool.
#[derive(Debug, Clone, PartialEq)]
pub enum Svg {
    Rendered(String),
    /// The tool was missing or failed; carries enough to show the diagram
    /// source instead.
    Fallback {
        error: String,
        stderr: String,
        dot: String,
    },
}

impl Svg {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Svg::Rendered(_))
    }
}

impl fmt::Display for Svg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Svg::Rendered(svg) => f.write_str(svg),
            Svg::Fallback { error, stderr, dot } => {
                writeln!(f, "Workflow diagram could not be generated, the error message was:")?;
                writeln!(f, "{}", error)?;
                if !stderr.is_empty() {
                    writeln!(f, "{}", stderr)?;
                }
                write!(f, "{}", dot)
            }
        }
    }
}

/// Pipes `dot` source through `<binary> -Tsvg`.
pub fn dot_to_svg(dot: &str, binary: &str) -> Svg {
    let fallback = |error: String, stderr: String| {
        warn!(binary, error = %error, "Diagram rendering failed");
        Svg::Fallback {
            error,
            stderr,
            dot: dot.to_string(),
        }
    };

    let mut child = match Command::new(binary)
        .arg("-Tsvg")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return fallback(format!("failed to run '{}': {}", binary, e), String::new()),
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(dot.as_bytes()) {
            let _ = child.kill();
            return fallback(format!("failed to write to '{}': {}", binary, e), String::new());
        }
    }

    let output = match child.wait_with_output() {
        Ok(output) => output,
        Err(e) => return fallback(format!("'{}' did not finish: {}", binary, e), String::new()),
    };
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return fallback(format!("'{}' exited with {}", binary, output.status), stderr);
    }

    let svg = String::from_utf8_lossy(&output.stdout);
    Svg::Rendered(strip_pt_sizes(&svg))
}

// Fixed `width="123pt"` style sizes, so the svg scales with its container.
// The leading whitespace keeps attributes like `stroke-width` untouched.
static PT_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\s)(?:width|height)="[0-9]*pt""#).expect("valid size pattern")
});

fn strip_pt_sizes(svg: &str) -> String {
    PT_SIZE.replace_all(svg, "$1").into_owned()
}
