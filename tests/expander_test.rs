use breadflow::compiler::expander::Expander;
use breadflow::dsl::builder::DiagramBuilder;
use breadflow::nodes::NodeKind;

#[test]
fn test_expand_flattens_all_target_shapes() {
    // a -> (b, c); c -> d; d -> {yes: e, no: null}
    let diagram = DiagramBuilder::new("shapes")
        .action("a")
        .action("b")
        .action("c")
        .decision("d", &["yes", "no"])
        .action("e")
        .parallel("a", &["b", "c"])
        .connect("c", "d")
        .choose("d")
            .when("yes", "e")
            .end_when("no")
            .build()
        .build();

    let graph = Expander::new().expand(&diagram).expect("Expansion failed");
    let id = |name: &str| graph.find(name).unwrap().id;

    // Parallel targets are unconditional
    assert!(graph.edges.iter().any(|e| e.source == id("a") && e.target == id("b") && e.choice.is_none()));
    assert!(graph.edges.iter().any(|e| e.source == id("a") && e.target == id("c") && e.choice.is_none()));

    // Choice edges keep their label
    assert!(graph.edges.iter().any(|e| e.source == id("d") && e.target == id("e") && e.choice.as_deref() == Some("yes")));
    let no_edge = graph
        .edges
        .iter()
        .find(|e| e.source == id("d") && e.choice.as_deref() == Some("no"))
        .expect("Missing 'no' edge");
    assert!(matches!(graph.node(no_edge.target).kind, NodeKind::FlowFinal));
}

#[test]
fn test_expand_inserts_boundaries_once_per_node() {
    let diagram = DiagramBuilder::new("boundaries")
        .action("a")
        .action("b")
        .action("c")
        .parallel("a", &["b", "c"])
        .build();

    let graph = Expander::new().expand(&diagram).unwrap();
    let initials: Vec<_> = graph.initials().collect();
    assert_eq!(initials.len(), 1, "a is a source of two edges but needs one initial");
    assert_eq!(graph.workflow_finals().count(), 2, "b and c each end the workflow");

    let a = graph.find("a").unwrap().id;
    assert!(graph.edges.iter().any(|e| e.source == initials[0] && e.target == a));
    // generated nodes are flagged
    assert!(graph.nodes.iter().filter(|n| n.generated).all(|n| n.name.starts_with('_')));
}

#[test]
fn test_expand_ignores_duplicate_targets() {
    let diagram = DiagramBuilder::new("dupes")
        .action("a")
        .action("b")
        .parallel("a", &["b", "b"])
        .build();

    let graph = Expander::new().expand(&diagram).unwrap();
    let a = graph.find("a").unwrap().id;
    assert_eq!(graph.outgoing(a), 1);
}
