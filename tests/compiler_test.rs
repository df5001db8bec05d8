use breadflow::compiler::core::Compiler;
use breadflow::dsl::builder::DiagramBuilder;
use breadflow::error::DiagramError;
use breadflow::nodes::NodeKind;

#[test]
fn test_compile_linear_diagram() {
    let diagram = DiagramBuilder::new("linear")
        .action("a")
        .action("b")
        .connect("a", "b")
        .build();

    let graph = Compiler::new().compile(&diagram).expect("Compilation failed");

    // a, b plus an inserted initial and workflow final
    assert_eq!(graph.nodes.len(), 4);
    assert_eq!(graph.edges.len(), 3);
    assert_eq!(graph.initials().count(), 1);
    assert_eq!(graph.workflow_finals().count(), 1);

    let a = graph.find("a").unwrap();
    let b = graph.find("b").unwrap();
    assert!(matches!(graph.node(a.inputs[0].node).kind, NodeKind::Initial));
    assert_eq!(a.outputs[0].node, b.id);
    assert!(matches!(graph.node(b.outputs[0].node).kind, NodeKind::WorkflowFinal));
}

#[test]
fn test_compile_is_deterministic() {
    let diagram = DiagramBuilder::new("review")
        .action("draft")
        .decision("approve", &["yes", "no"])
        .action("publish")
        .action("rework")
        .connect("draft", "approve")
        .choose("approve")
            .when("yes", "publish")
            .when("no", "rework")
            .build()
        .connect("rework", "publish")
        .build();

    let compiler = Compiler::new();
    let first = compiler.compile(&diagram).unwrap();
    let second = compiler.compile(&diagram).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_declared_initial_is_reused() {
    let diagram = DiagramBuilder::new("explicit-start")
        .initial("start")
        .action("a")
        .workflow_final("end")
        .connect("start", "a")
        .connect("a", "end")
        .build();

    let graph = Compiler::new().compile(&diagram).unwrap();
    assert_eq!(graph.nodes.len(), 3);
    assert!(graph.nodes.iter().all(|n| !n.generated));
}

#[test]
fn test_null_target_becomes_flow_final() {
    let diagram = DiagramBuilder::new("early-exit")
        .decision("continue", &["yes", "no"])
        .action("work")
        .choose("continue")
            .when("yes", "work")
            .end_when("no")
            .build()
        .build();

    let graph = Compiler::new().compile(&diagram).unwrap();
    let decision = graph.find("continue").unwrap();
    let no_branch = decision
        .outputs
        .iter()
        .find(|p| p.choice.as_deref() == Some("no"))
        .unwrap();
    assert!(matches!(graph.node(no_branch.node).kind, NodeKind::FlowFinal));
    // only the real end of the workflow gets a WorkflowFinal
    assert_eq!(graph.workflow_finals().count(), 1);
}

#[test]
fn test_unused_declared_nodes_are_dropped() {
    let diagram = DiagramBuilder::new("unused")
        .action("a")
        .action("b")
        .action("orphan")
        .connect("a", "b")
        .build();

    let graph = Compiler::new().compile(&diagram).unwrap();
    assert!(graph.find("orphan").is_none());
    for (index, node) in graph.nodes.iter().enumerate() {
        assert_eq!(node.id.0, index);
    }
}

#[test]
fn test_decision_with_single_target_violates_arity() {
    let diagram = DiagramBuilder::new("bad-decision")
        .decision("d", &["yes", "no"])
        .action("x")
        .connect("d", "x")
        .build();

    let err = Compiler::new().compile(&diagram).unwrap_err();
    match err {
        DiagramError::Arity { node, kind, outputs, .. } => {
            assert_eq!(node, "d");
            assert_eq!(kind, "decision");
            assert_eq!(outputs, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_choices_on_action_are_rejected() {
    let diagram = DiagramBuilder::new("bad-choices")
        .action("a")
        .action("x")
        .choose("a")
            .when("yes", "x")
            .build()
        .build();

    let err = Compiler::new().compile(&diagram).unwrap_err();
    assert_eq!(err, DiagramError::ChoicesOnNonDecision("a".to_string()));
}

#[test]
fn test_decision_without_choices_is_rejected() {
    let diagram = DiagramBuilder::new("no-choices")
        .decision("d", &[])
        .action("x")
        .connect("d", "x")
        .build();

    let err = Compiler::new().compile(&diagram).unwrap_err();
    assert_eq!(err, DiagramError::MissingChoices("d".to_string()));
}

#[test]
fn test_undeclared_choice_label_is_rejected() {
    let diagram = DiagramBuilder::new("wrong-label")
        .decision("d", &["yes", "no"])
        .action("x")
        .action("y")
        .choose("d")
            .when("yes", "x")
            .when("maybe", "y")
            .build()
        .build();

    let err = Compiler::new().compile(&diagram).unwrap_err();
    assert!(matches!(err, DiagramError::ChoiceMismatch { ref node, .. } if node == "d"));
}

#[test]
fn test_unknown_and_duplicate_nodes_are_rejected() {
    let unknown = DiagramBuilder::new("unknown")
        .action("a")
        .connect("a", "ghost")
        .build();
    assert_eq!(
        Compiler::new().compile(&unknown).unwrap_err(),
        DiagramError::UnknownNode("ghost".to_string())
    );

    let duplicate = DiagramBuilder::new("duplicate")
        .action("a")
        .action("a")
        .action("b")
        .connect("a", "b")
        .build();
    assert_eq!(
        Compiler::new().compile(&duplicate).unwrap_err(),
        DiagramError::DuplicateNode("a".to_string())
    );

    let twice = DiagramBuilder::new("twice")
        .action("a")
        .action("b")
        .action("c")
        .connect("a", "b")
        .connect("a", "c")
        .build();
    assert_eq!(
        Compiler::new().compile(&twice).unwrap_err(),
        DiagramError::DuplicateSource("a".to_string())
    );
}

#[test]
fn test_structural_failures() {
    let empty = DiagramBuilder::new("empty").action("a").build();
    assert_eq!(
        Compiler::new().compile(&empty).unwrap_err(),
        DiagramError::Empty("empty".to_string())
    );

    let never_ends = DiagramBuilder::new("never-ends")
        .action("a")
        .terminate("a")
        .build();
    assert_eq!(
        Compiler::new().compile(&never_ends).unwrap_err(),
        DiagramError::NoWorkflowFinal("never-ends".to_string())
    );

    let no_entry = DiagramBuilder::new("no-entry")
        .action("a")
        .action("b")
        .connect("a", "b")
        .connect("b", "a")
        .build();
    assert_eq!(
        Compiler::new().compile(&no_entry).unwrap_err(),
        DiagramError::NoInitial("no-entry".to_string())
    );
}

#[test]
fn test_loops_are_rejected() {
    let diagram = DiagramBuilder::new("loop")
        .action("submit")
        .action("edit")
        .decision("ok", &["again", "done"])
        .action("archive")
        .connect("submit", "edit")
        .connect("edit", "ok")
        .choose("ok")
            .when("again", "edit")
            .when("done", "archive")
            .build()
        .build();

    let err = Compiler::new().compile(&diagram).unwrap_err();
    assert!(matches!(err, DiagramError::Cycle(_)), "unexpected error: {err}");
}

#[test]
fn test_every_node_satisfies_its_arity() {
    let diagram = DiagramBuilder::new("mixed")
        .action("s")
        .action("a")
        .action("b")
        .join("j")
        .decision("d", &["left", "right"])
        .action("l")
        .action("r")
        .parallel("s", &["a", "b"])
        .connect("a", "j")
        .connect("b", "j")
        .connect("j", "d")
        .choose("d")
            .when("left", "l")
            .when("right", "r")
            .build()
        .connect("l", "r")
        .build();

    let graph = Compiler::new().compile(&diagram).unwrap();
    for node in &graph.nodes {
        assert!(
            node.kind.arity().allows(node.inputs.len(), node.outputs.len()),
            "{} violates its arity",
            node.name
        );
    }
}

#[test]
fn test_default_compiler_matches_new() {
    let diagram = DiagramBuilder::new("linear")
        .action("a")
        .action("b")
        .connect("a", "b")
        .build();
    assert_eq!(
        Compiler::default().compile(&diagram).unwrap(),
        Compiler::new().compile(&diagram).unwrap()
    );
}
